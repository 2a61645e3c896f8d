//! Adam optimizer for the Q-network

use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};

use adopt_core::{AdoptError, Result};

use crate::network::{Gradients, QNetwork};

/// First and second moment estimates for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMoments {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Adam with bias correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    /// Number of updates applied so far
    step: u64,
    first_moments: Vec<LayerMoments>,
    second_moments: Vec<LayerMoments>,
}

impl Adam {
    pub fn new(network: &QNetwork, learning_rate: f64) -> Self {
        let zeros = || -> Vec<LayerMoments> {
            network
                .layers()
                .iter()
                .map(|l| LayerMoments {
                    weights: Array2::zeros(l.weights.dim()),
                    bias: Array1::zeros(l.bias.len()),
                })
                .collect()
        };
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            first_moments: zeros(),
            second_moments: zeros(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Apply one update of `gradients` to `network`
    pub fn step(&mut self, network: &mut QNetwork, gradients: &Gradients) {
        self.step += 1;
        let t = self.step as i32;
        let (b1, b2) = (self.beta1, self.beta2);
        let lr = self.learning_rate * (1.0 - b2.powi(t)).sqrt() / (1.0 - b1.powi(t));
        let eps = self.epsilon;

        let layers = network.layers_mut().iter_mut();
        let moments = self.first_moments.iter_mut().zip(self.second_moments.iter_mut());
        for ((layer, grad), (m, v)) in layers.zip(&gradients.layers).zip(moments) {
            Zip::from(&mut layer.weights)
                .and(&grad.weights)
                .and(&mut m.weights)
                .and(&mut v.weights)
                .for_each(|w, &g, mean, var| {
                    *mean = b1 * *mean + (1.0 - b1) * g;
                    *var = b2 * *var + (1.0 - b2) * g * g;
                    *w -= lr * *mean / (var.sqrt() + eps);
                });
            Zip::from(&mut layer.bias)
                .and(&grad.bias)
                .and(&mut m.bias)
                .and(&mut v.bias)
                .for_each(|b, &g, mean, var| {
                    *mean = b1 * *mean + (1.0 - b1) * g;
                    *var = b2 * *var + (1.0 - b2) * g * g;
                    *b -= lr * *mean / (var.sqrt() + eps);
                });
        }
    }

    /// Check moment buffers line up with `network`
    pub fn validate(&self, network: &QNetwork) -> Result<()> {
        let layers = network.layers();
        if self.first_moments.len() != layers.len() || self.second_moments.len() != layers.len() {
            return Err(AdoptError::CheckpointShape(format!(
                "optimizer tracks {} layers, network has {}",
                self.first_moments.len(),
                layers.len()
            )));
        }
        let moments = self.first_moments.iter().zip(&self.second_moments);
        for (i, (layer, (m, v))) in layers.iter().zip(moments).enumerate() {
            let ok = m.weights.dim() == layer.weights.dim()
                && v.weights.dim() == layer.weights.dim()
                && m.bias.len() == layer.bias.len()
                && v.bias.len() == layer.bias.len();
            if !ok {
                return Err(AdoptError::CheckpointShape(format!(
                    "optimizer moments for layer {i} do not match the network"
                )));
            }
        }
        Ok(())
    }
}
