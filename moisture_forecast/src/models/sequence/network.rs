//! Stacked LSTM network with dropout and a dense head

use super::layers::{
    Activation, DenseGradients, DenseLayer, LstmCache, LstmGradients, LstmLayer,
};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Layer sizes of the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkShape {
    pub inputs: usize,
    pub first_units: usize,
    pub second_units: usize,
    pub dense_units: usize,
}

/// LSTM (full sequence) → dropout → LSTM (last state) → dropout → dense ReLU → dense linear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceNetwork {
    first: LstmLayer,
    second: LstmLayer,
    hidden: DenseLayer,
    output: DenseLayer,
}

/// Inverted dropout applied while training
pub struct Dropout<'a> {
    pub rate: f64,
    pub rng: &'a mut StdRng,
}

/// Intermediate values of one forward pass
pub struct NetworkCache {
    first: LstmCache,
    first_mask: Vec<Vec<f64>>,
    second: LstmCache,
    second_mask: Vec<f64>,
    dropped: Vec<f64>,
    hidden_pre: Vec<f64>,
    hidden_out: Vec<f64>,
    output_pre: Vec<f64>,
}

/// Gradients of every network parameter
pub struct NetworkGradients {
    first: LstmGradients,
    second: LstmGradients,
    hidden: DenseGradients,
    output: DenseGradients,
}

fn dropout_mask(dropout: &mut Option<Dropout<'_>>, len: usize) -> Vec<f64> {
    match dropout {
        Some(d) if d.rate > 0.0 => {
            let keep = 1.0 / (1.0 - d.rate);
            (0..len)
                .map(|_| if d.rng.gen::<f64>() < d.rate { 0.0 } else { keep })
                .collect()
        }
        _ => vec![1.0; len],
    }
}

fn masked(values: &[f64], mask: &[f64]) -> Vec<f64> {
    values.iter().zip(mask).map(|(v, m)| v * m).collect()
}

impl SequenceNetwork {
    /// Build a network with freshly initialised weights
    pub fn new(shape: NetworkShape, rng: &mut StdRng) -> Self {
        Self {
            first: LstmLayer::new(shape.inputs, shape.first_units, rng),
            second: LstmLayer::new(shape.first_units, shape.second_units, rng),
            hidden: DenseLayer::new(shape.second_units, shape.dense_units, Activation::Relu, rng),
            output: DenseLayer::new(shape.dense_units, 1, Activation::Linear, rng),
        }
    }

    /// Number of input features per step
    pub fn input_size(&self) -> usize {
        self.first.input_size()
    }

    /// Forward pass; dropout is applied only when given
    pub fn forward(&self, inputs: &[Vec<f64>], mut dropout: Option<Dropout<'_>>) -> (f64, NetworkCache) {
        let first = self.first.forward(inputs);
        let first_mask: Vec<Vec<f64>> = (0..inputs.len())
            .map(|_| dropout_mask(&mut dropout, self.first.hidden_size()))
            .collect();
        let first_dropped: Vec<Vec<f64>> = first
            .outputs()
            .iter()
            .zip(&first_mask)
            .map(|(h, m)| masked(h, m))
            .collect();

        let second = self.second.forward(&first_dropped);
        let second_mask = dropout_mask(&mut dropout, self.second.hidden_size());
        let dropped = masked(second.last_output(), &second_mask);

        let (hidden_pre, hidden_out) = self.hidden.forward(&dropped);
        let (output_pre, output) = self.output.forward(&hidden_out);

        let cache = NetworkCache {
            first,
            first_mask,
            second,
            second_mask,
            dropped,
            hidden_pre,
            hidden_out,
            output_pre,
        };
        (output[0], cache)
    }

    /// Deterministic prediction for one sequence
    pub fn predict(&self, inputs: &[Vec<f64>]) -> f64 {
        self.forward(inputs, None).0
    }

    pub fn zero_gradients(&self) -> NetworkGradients {
        NetworkGradients {
            first: self.first.zero_gradients(),
            second: self.second.zero_gradients(),
            hidden: self.hidden.zero_gradients(),
            output: self.output.zero_gradients(),
        }
    }

    /// Accumulate gradients for a pass whose loss has derivative `output_grad` w.r.t. the output
    pub fn backward(&self, cache: &NetworkCache, output_grad: f64, grads: &mut NetworkGradients) {
        let d_hidden =
            self.output
                .backward(&cache.hidden_out, &cache.output_pre, &[output_grad], &mut grads.output);
        let d_dropped = self
            .hidden
            .backward(&cache.dropped, &cache.hidden_pre, &d_hidden, &mut grads.hidden);

        let steps = cache.first_mask.len();
        let mut second_grads = vec![vec![0.0; self.second.hidden_size()]; steps];
        if let Some(last) = second_grads.last_mut() {
            *last = masked(&d_dropped, &cache.second_mask);
        }
        let d_first_dropped = self
            .second
            .backward(&cache.second, &second_grads, &mut grads.second);

        let first_grads: Vec<Vec<f64>> = d_first_dropped
            .iter()
            .zip(&cache.first_mask)
            .map(|(g, m)| masked(g, m))
            .collect();
        self.first.backward(&cache.first, &first_grads, &mut grads.first);
    }

    /// Parameter tensors in a fixed order matching [`NetworkGradients::tensors`]
    pub fn parameters_mut(&mut self) -> Vec<&mut [f64]> {
        let mut params = Vec::with_capacity(10);
        params.extend(self.first.parameters_mut());
        params.extend(self.second.parameters_mut());
        params.extend(self.hidden.parameters_mut());
        params.extend(self.output.parameters_mut());
        params
    }
}

impl NetworkGradients {
    /// Gradient tensors in parameter order
    pub fn tensors(&self) -> Vec<&[f64]> {
        let mut tensors = Vec::with_capacity(10);
        tensors.extend(self.first.tensors());
        tensors.extend(self.second.tensors());
        tensors.extend(self.hidden.tensors());
        tensors.extend(self.output.tensors());
        tensors
    }
}
