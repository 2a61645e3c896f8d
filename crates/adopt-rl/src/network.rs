//! Feed-forward Q-network
//!
//! A stack of fully-connected layers with ReLU activations and inverted
//! dropout between hidden layers. The final layer is linear and produces one
//! Q-value per action. Training uses explicit forward caches and hand-written
//! backpropagation over `ndarray` batches.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use adopt_core::{AdoptError, Result};

/// Anything that maps a state to per-action value estimates
pub trait ValueFunction: Send + Sync {
    /// Q-value estimate for every action
    fn q_values(&self, state: &[f64]) -> Array1<f64>;

    /// Number of actions covered by `q_values`
    fn action_count(&self) -> usize;

    /// Best action, ties broken by lowest index
    fn greedy_action(&self, state: &[f64]) -> usize {
        argmax(&self.q_values(state))
    }
}

/// Layer dimensions of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkShape {
    pub input: usize,
    pub hidden: Vec<usize>,
    pub output: usize,
}

impl NetworkShape {
    pub fn new(input: usize, hidden: &[usize], output: usize) -> Self {
        Self {
            input,
            hidden: hidden.to_vec(),
            output,
        }
    }

    /// `(fan_in, fan_out)` of every layer in order
    pub fn layer_dims(&self) -> Vec<(usize, usize)> {
        let mut dims = Vec::with_capacity(self.hidden.len() + 2);
        dims.push(self.input);
        dims.extend(&self.hidden);
        dims.push(self.output);
        dims.windows(2).map(|w| (w[0], w[1])).collect()
    }
}

impl std::fmt::Display for NetworkShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.input)?;
        for width in &self.hidden {
            write!(f, "x{width}")?;
        }
        write!(f, "x{}", self.output)
    }
}

/// Fully-connected layer; `weights` is `(fan_in, fan_out)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl DenseLayer {
    /// Xavier/Glorot uniform initialization with zero bias
    fn init<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let weights = Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(fan_out),
        }
    }

    fn dims(&self) -> (usize, usize) {
        self.weights.dim()
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

/// Intermediate values of a training-mode forward pass
#[derive(Debug, Clone)]
pub struct ForwardCache {
    /// Input fed into each layer
    inputs: Vec<Array2<f64>>,
    /// Pre-activation of each hidden layer
    pre_activations: Vec<Array2<f64>>,
    /// Scaled keep-masks applied after each hidden layer, if any
    masks: Vec<Option<Array2<f64>>>,
    /// Network output, `(batch, actions)`
    pub output: Array2<f64>,
}

/// Per-layer parameter gradients, same layout as the network
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<DenseLayer>,
}

impl Gradients {
    /// L2 norm over every parameter gradient
    pub fn global_norm(&self) -> f64 {
        self.layers
            .iter()
            .map(|g| g.weights.iter().chain(g.bias.iter()).map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            .sqrt()
    }

    /// Rescale so the global norm does not exceed `max_norm`; returns the norm before clipping
    pub fn clip_norm(&mut self, max_norm: f64) -> f64 {
        let norm = self.global_norm();
        if norm > max_norm {
            let scale = max_norm / (norm + 1e-6);
            for g in &mut self.layers {
                g.weights.mapv_inplace(|v| v * scale);
                g.bias.mapv_inplace(|v| v * scale);
            }
        }
        norm
    }
}

/// Q-network with a fixed layer stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QNetwork {
    layers: Vec<DenseLayer>,
    dropout: f64,
}

impl QNetwork {
    pub fn new<R: Rng + ?Sized>(shape: &NetworkShape, dropout: f64, rng: &mut R) -> Self {
        let layers = shape
            .layer_dims()
            .into_iter()
            .map(|(fan_in, fan_out)| DenseLayer::init(fan_in, fan_out, rng))
            .collect();
        Self { layers, dropout }
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.dims().0)
    }

    pub fn shape(&self) -> NetworkShape {
        let input = self.input_size();
        let output = self.layers.last().map_or(0, |l| l.dims().1);
        let hidden = self.layers[..self.layers.len().saturating_sub(1)]
            .iter()
            .map(|l| l.dims().1)
            .collect();
        NetworkShape {
            input,
            hidden,
            output,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }

    /// Check that layers chain and match `expected`
    pub fn validate(&self, expected: &NetworkShape) -> Result<()> {
        for (i, layer) in self.layers.iter().enumerate() {
            let (fan_in, fan_out) = layer.dims();
            if layer.bias.len() != fan_out {
                return Err(AdoptError::CheckpointShape(format!(
                    "layer {i}: bias has {} entries for {fan_out} outputs",
                    layer.bias.len()
                )));
            }
            if i > 0 && self.layers[i - 1].dims().1 != fan_in {
                return Err(AdoptError::CheckpointShape(format!(
                    "layer {i}: expects {fan_in} inputs but previous layer emits {}",
                    self.layers[i - 1].dims().1
                )));
            }
        }
        let actual = self.shape();
        if &actual != expected {
            return Err(AdoptError::CheckpointShape(format!(
                "network is {actual}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Inference pass over a batch, dropout disabled
    pub fn forward_batch(&self, inputs: &Array2<f64>) -> Array2<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut activation = inputs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            activation = layer.forward(&activation);
            if i < last {
                activation.mapv_inplace(relu);
            }
        }
        activation
    }

    /// Inference pass for a single state
    pub fn forward(&self, input: &Array1<f64>) -> Array1<f64> {
        let row = input.view().insert_axis(Axis(0)).to_owned();
        self.forward_batch(&row).row(0).to_owned()
    }

    /// Training pass with dropout; keeps what `backward` needs
    pub fn forward_train<R: Rng + ?Sized>(
        &self,
        inputs: &Array2<f64>,
        rng: &mut R,
    ) -> ForwardCache {
        let last = self.layers.len().saturating_sub(1);
        let keep = 1.0 - self.dropout;

        let mut cache = ForwardCache {
            inputs: Vec::with_capacity(self.layers.len()),
            pre_activations: Vec::with_capacity(last),
            masks: Vec::with_capacity(last),
            output: Array2::zeros((0, 0)),
        };

        let mut activation = inputs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&activation);
            cache.inputs.push(activation);

            if i == last {
                activation = z;
                break;
            }

            let mut a = z.mapv(relu);
            cache.pre_activations.push(z);

            // No dropout right before the output layer
            let mask = if self.dropout > 0.0 && i + 1 < last {
                let mask = Array2::from_shape_fn(a.dim(), |_| {
                    if rng.gen::<f64>() < self.dropout {
                        0.0
                    } else {
                        1.0 / keep
                    }
                });
                a *= &mask;
                Some(mask)
            } else {
                None
            };
            cache.masks.push(mask);
            activation = a;
        }

        cache.output = activation;
        cache
    }

    /// Backpropagate `grad_output` (dLoss/dOutput) through a cached pass
    pub fn backward(&self, cache: &ForwardCache, grad_output: &Array2<f64>) -> Gradients {
        let mut grads: Vec<DenseLayer> = Vec::with_capacity(self.layers.len());
        let mut delta = grad_output.clone();

        for i in (0..self.layers.len()).rev() {
            let input = &cache.inputs[i];
            grads.push(DenseLayer {
                weights: input.t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });

            if i > 0 {
                let mut upstream = delta.dot(&self.layers[i].weights.t());
                if let Some(mask) = &cache.masks[i - 1] {
                    upstream *= mask;
                }
                let z = &cache.pre_activations[i - 1];
                upstream.zip_mut_with(z, |g, &pre| {
                    if pre <= 0.0 {
                        *g = 0.0;
                    }
                });
                delta = upstream;
            }
        }

        grads.reverse();
        Gradients { layers: grads }
    }

    /// One-way hard copy of `source` parameters into `self`
    pub fn copy_from(&mut self, source: &QNetwork) {
        self.layers.clone_from(&source.layers);
        self.dropout = source.dropout;
    }
}

impl ValueFunction for QNetwork {
    fn q_values(&self, state: &[f64]) -> Array1<f64> {
        let input =
            Array1::from_shape_fn(self.input_size(), |i| state.get(i).copied().unwrap_or(0.0));
        self.forward(&input)
    }

    fn action_count(&self) -> usize {
        self.shape().output
    }
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Index of the largest finite value; first index wins ties
pub fn argmax(values: &Array1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
