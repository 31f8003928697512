//! Adam optimiser over flat parameter tensors

/// Adam with bias-corrected moment estimates
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: i32,
    first_moment: Vec<Vec<f64>>,
    second_moment: Vec<Vec<f64>>,
}

impl Adam {
    /// Create an optimiser with β1 0.9, β2 0.999 and ε 1e-7
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Apply one update. `params` and `grads` list the same tensors in the same order on every call.
    pub fn update(&mut self, params: Vec<&mut [f64]>, grads: Vec<&[f64]>) {
        if self.first_moment.is_empty() {
            self.first_moment = grads.iter().map(|g| vec![0.0; g.len()]).collect();
            self.second_moment = grads.iter().map(|g| vec![0.0; g.len()]).collect();
        }

        self.step += 1;
        let correction1 = 1.0 - self.beta1.powi(self.step);
        let correction2 = 1.0 - self.beta2.powi(self.step);
        let step_size = self.learning_rate * correction2.sqrt() / correction1;

        for (tensor, ((param, grad), (m, v))) in params
            .into_iter()
            .zip(grads)
            .zip(self.first_moment.iter_mut().zip(self.second_moment.iter_mut()))
            .enumerate()
        {
            debug_assert_eq!(param.len(), grad.len(), "tensor {} shape changed", tensor);
            for i in 0..param.len() {
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * grad[i];
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * grad[i] * grad[i];
                param[i] -= step_size * m[i] / (v[i].sqrt() + self.epsilon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adam_minimises_quadratic() {
        let mut adam = Adam::new(0.1);
        let mut x = vec![5.0, -3.0];

        for _ in 0..500 {
            let grad: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
            adam.update(vec![x.as_mut_slice()], vec![grad.as_slice()]);
        }

        assert!(x.iter().all(|v| v.abs() < 0.05));
    }

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(0.01);
        let mut x = vec![1.0];
        adam.update(vec![x.as_mut_slice()], vec![[4.0].as_slice()]);
        assert!((x[0] - 0.99).abs() < 1e-6);
    }
}
