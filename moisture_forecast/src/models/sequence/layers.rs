//! LSTM and dense layers with explicit forward caches and gradients

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Glorot-uniform initialisation for a `fan_out x fan_in` matrix
fn glorot_uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Vec<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    (0..fan_in * fan_out)
        .map(|_| rng.gen_range(-limit..limit))
        .collect()
}

/// Long short-term memory layer.
///
/// Gate rows are stacked as input, forget, candidate, output; each block has
/// `hidden_size` rows. The cell uses tanh for the candidate and the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    input_size: usize,
    hidden_size: usize,
    /// `4H x input_size`, row-major
    kernel: Vec<f64>,
    /// `4H x H`, row-major
    recurrent: Vec<f64>,
    bias: Vec<f64>,
}

/// Values kept from a forward pass for backpropagation through time
#[derive(Debug, Clone)]
pub struct LstmCache {
    inputs: Vec<Vec<f64>>,
    /// Hidden states, including the zero initial state
    hidden: Vec<Vec<f64>>,
    /// Cell states, including the zero initial state
    cells: Vec<Vec<f64>>,
    /// Activated gates per step
    gates: Vec<Vec<f64>>,
}

impl LstmCache {
    /// Hidden state after each step
    pub fn outputs(&self) -> &[Vec<f64>] {
        &self.hidden[1..]
    }

    /// Hidden state after the last step
    pub fn last_output(&self) -> &[f64] {
        &self.hidden[self.hidden.len() - 1]
    }
}

/// Accumulated LSTM parameter gradients
#[derive(Debug, Clone)]
pub struct LstmGradients {
    pub kernel: Vec<f64>,
    pub recurrent: Vec<f64>,
    pub bias: Vec<f64>,
}

impl LstmLayer {
    /// Create a layer with Glorot-uniform weights and a forget-gate bias of one
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let gates = 4 * hidden_size;
        let mut bias = vec![0.0; gates];
        bias[hidden_size..2 * hidden_size].fill(1.0);

        Self {
            input_size,
            hidden_size,
            kernel: glorot_uniform(rng, input_size, gates),
            recurrent: glorot_uniform(rng, hidden_size, gates),
            bias,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Run the layer over a sequence starting from zero state
    pub fn forward(&self, inputs: &[Vec<f64>]) -> LstmCache {
        let h = self.hidden_size;
        let mut cache = LstmCache {
            inputs: inputs.to_vec(),
            hidden: Vec::with_capacity(inputs.len() + 1),
            cells: Vec::with_capacity(inputs.len() + 1),
            gates: Vec::with_capacity(inputs.len()),
        };
        cache.hidden.push(vec![0.0; h]);
        cache.cells.push(vec![0.0; h]);

        for (t, x) in inputs.iter().enumerate() {
            let h_prev = &cache.hidden[t];
            let c_prev = &cache.cells[t];

            let mut gates: Vec<f64> = (0..4 * h)
                .map(|r| {
                    self.bias[r]
                        + dot(&self.kernel[r * self.input_size..(r + 1) * self.input_size], x)
                        + dot(&self.recurrent[r * h..(r + 1) * h], h_prev)
                })
                .collect();

            let mut cell = vec![0.0; h];
            let mut hidden = vec![0.0; h];
            for j in 0..h {
                gates[j] = sigmoid(gates[j]);
                gates[h + j] = sigmoid(gates[h + j]);
                gates[2 * h + j] = gates[2 * h + j].tanh();
                gates[3 * h + j] = sigmoid(gates[3 * h + j]);

                cell[j] = gates[h + j] * c_prev[j] + gates[j] * gates[2 * h + j];
                hidden[j] = gates[3 * h + j] * cell[j].tanh();
            }

            cache.gates.push(gates);
            cache.cells.push(cell);
            cache.hidden.push(hidden);
        }

        cache
    }

    /// Zeroed gradients shaped like the parameters
    pub fn zero_gradients(&self) -> LstmGradients {
        LstmGradients {
            kernel: vec![0.0; self.kernel.len()],
            recurrent: vec![0.0; self.recurrent.len()],
            bias: vec![0.0; self.bias.len()],
        }
    }

    /// Backpropagate through time.
    ///
    /// `output_grads` holds the loss gradient for the hidden state of every
    /// step. Parameter gradients are added to `grads`; the gradient for each
    /// input step is returned.
    pub fn backward(
        &self,
        cache: &LstmCache,
        output_grads: &[Vec<f64>],
        grads: &mut LstmGradients,
    ) -> Vec<Vec<f64>> {
        let h = self.hidden_size;
        let n_in = self.input_size;
        let steps = cache.inputs.len();

        let mut input_grads = vec![vec![0.0; n_in]; steps];
        let mut dh_next = vec![0.0; h];
        let mut dc_next = vec![0.0; h];
        let mut d_pre = vec![0.0; 4 * h];

        for t in (0..steps).rev() {
            let gates = &cache.gates[t];
            let c_prev = &cache.cells[t];
            let cell = &cache.cells[t + 1];
            let h_prev = &cache.hidden[t];
            let x = &cache.inputs[t];

            for j in 0..h {
                let (i, f, g, o) = (gates[j], gates[h + j], gates[2 * h + j], gates[3 * h + j]);
                let dh = output_grads[t][j] + dh_next[j];
                let tanh_c = cell[j].tanh();
                let dc = dh * o * (1.0 - tanh_c * tanh_c) + dc_next[j];

                d_pre[j] = dc * g * i * (1.0 - i);
                d_pre[h + j] = dc * c_prev[j] * f * (1.0 - f);
                d_pre[2 * h + j] = dc * i * (1.0 - g * g);
                d_pre[3 * h + j] = dh * tanh_c * o * (1.0 - o);
                dc_next[j] = dc * f;
            }

            dh_next.fill(0.0);
            for (r, &d) in d_pre.iter().enumerate() {
                if d == 0.0 {
                    continue;
                }
                grads.bias[r] += d;

                let kernel_row = r * n_in..(r + 1) * n_in;
                for (k, (grad, weight)) in grads.kernel[kernel_row.clone()]
                    .iter_mut()
                    .zip(&self.kernel[kernel_row])
                    .enumerate()
                {
                    *grad += d * x[k];
                    input_grads[t][k] += weight * d;
                }

                let recurrent_row = r * h..(r + 1) * h;
                for (k, (grad, weight)) in grads.recurrent[recurrent_row.clone()]
                    .iter_mut()
                    .zip(&self.recurrent[recurrent_row])
                    .enumerate()
                {
                    *grad += d * h_prev[k];
                    dh_next[k] += weight * d;
                }
            }
        }

        input_grads
    }

    /// Mutable parameter tensors: kernel, recurrent, bias
    pub fn parameters_mut(&mut self) -> [&mut [f64]; 3] {
        [
            self.kernel.as_mut_slice(),
            self.recurrent.as_mut_slice(),
            self.bias.as_mut_slice(),
        ]
    }
}

impl LstmGradients {
    pub fn tensors(&self) -> [&[f64]; 3] {
        [
            self.kernel.as_slice(),
            self.recurrent.as_slice(),
            self.bias.as_slice(),
        ]
    }
}

/// Activation of a dense layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Linear => 1.0,
        }
    }
}

/// Fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    /// `output_size x input_size`, row-major
    weights: Vec<f64>,
    bias: Vec<f64>,
    activation: Activation,
}

/// Accumulated dense-layer gradients
#[derive(Debug, Clone)]
pub struct DenseGradients {
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    /// Create a layer with Glorot-uniform weights and zero bias
    pub fn new(input_size: usize, output_size: usize, activation: Activation, rng: &mut StdRng) -> Self {
        Self {
            input_size,
            output_size,
            weights: glorot_uniform(rng, input_size, output_size),
            bias: vec![0.0; output_size],
            activation,
        }
    }

    /// Returns the pre-activation and activated outputs
    pub fn forward(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let pre: Vec<f64> = (0..self.output_size)
            .map(|r| {
                self.bias[r] + dot(&self.weights[r * self.input_size..(r + 1) * self.input_size], input)
            })
            .collect();
        let out = pre.iter().map(|&z| self.activation.apply(z)).collect();
        (pre, out)
    }

    pub fn zero_gradients(&self) -> DenseGradients {
        DenseGradients {
            weights: vec![0.0; self.weights.len()],
            bias: vec![0.0; self.bias.len()],
        }
    }

    /// Add parameter gradients to `grads` and return the input gradient
    pub fn backward(
        &self,
        input: &[f64],
        pre: &[f64],
        output_grads: &[f64],
        grads: &mut DenseGradients,
    ) -> Vec<f64> {
        let mut input_grads = vec![0.0; self.input_size];

        for r in 0..self.output_size {
            let d = output_grads[r] * self.activation.derivative(pre[r]);
            if d == 0.0 {
                continue;
            }
            grads.bias[r] += d;

            let row = r * self.input_size..(r + 1) * self.input_size;
            for (k, (grad, weight)) in grads.weights[row.clone()]
                .iter_mut()
                .zip(&self.weights[row])
                .enumerate()
            {
                *grad += d * input[k];
                input_grads[k] += weight * d;
            }
        }

        input_grads
    }

    /// Mutable parameter tensors: weights, bias
    pub fn parameters_mut(&mut self) -> [&mut [f64]; 2] {
        [self.weights.as_mut_slice(), self.bias.as_mut_slice()]
    }
}

impl DenseGradients {
    pub fn tensors(&self) -> [&[f64]; 2] {
        [self.weights.as_slice(), self.bias.as_slice()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn loss(layer: &LstmLayer, inputs: &[Vec<f64>]) -> f64 {
        layer.forward(inputs).outputs().iter().flatten().sum()
    }

    #[test]
    fn test_forget_bias_initialised_to_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = LstmLayer::new(2, 3, &mut rng);
        assert_eq!(&layer.bias[3..6], &[1.0, 1.0, 1.0]);
        assert!(layer.bias[..3].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_lstm_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = LstmLayer::new(2, 3, &mut rng);
        let inputs = vec![vec![0.5, -0.2], vec![0.1, 0.9], vec![-0.4, 0.3]];

        let cache = layer.forward(&inputs);
        let ones = vec![vec![1.0; 3]; inputs.len()];
        let mut grads = layer.zero_gradients();
        layer.backward(&cache, &ones, &mut grads);

        let eps = 1e-6;
        for index in [0, 5, 11] {
            let mut plus = layer.clone();
            plus.kernel[index] += eps;
            let mut minus = layer.clone();
            minus.kernel[index] -= eps;
            let numeric = (loss(&plus, &inputs) - loss(&minus, &inputs)) / (2.0 * eps);
            assert!((numeric - grads.kernel[index]).abs() < 1e-6);
        }
        for index in [0, 7, 20] {
            let mut plus = layer.clone();
            plus.recurrent[index] += eps;
            let mut minus = layer.clone();
            minus.recurrent[index] -= eps;
            let numeric = (loss(&plus, &inputs) - loss(&minus, &inputs)) / (2.0 * eps);
            assert!((numeric - grads.recurrent[index]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dense_relu_blocks_negative_gradient() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = DenseLayer::new(2, 1, Activation::Relu, &mut rng);
        let mut grads = layer.zero_gradients();
        let input_grads = layer.backward(&[1.0, 1.0], &[-0.5], &[1.0], &mut grads);
        assert_eq!(input_grads, vec![0.0, 0.0]);
        assert_eq!(grads.bias, vec![0.0]);
    }
}
