//! Learner configuration
//!
//! Every knob of the optimization loop lives here, including the business
//! weights of the reward model, so operators can tune them without a rebuild.

use serde::{Deserialize, Serialize};
use tracing::warn;

use adopt_core::{AdoptError, Result};

/// Configuration of the DQN learner and its replay memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Length of the encoded state vector
    #[serde(default = "default_state_size")]
    pub state_size: usize,

    /// Widths of the hidden fully-connected layers
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<usize>,

    /// Dropout probability between hidden layers during training
    #[serde(default = "default_dropout")]
    pub dropout: f64,

    /// Adam step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Discount factor applied to bootstrapped next-state values
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,

    #[serde(default = "default_epsilon_min")]
    pub epsilon_min: f64,

    /// Multiplicative epsilon decay per completed training step
    #[serde(default = "default_epsilon_decay")]
    pub epsilon_decay: f64,

    /// Replay memory capacity
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Training batch size
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Training steps between hard target-network syncs
    #[serde(default = "default_target_sync_interval")]
    pub target_sync_interval: u64,

    /// Global gradient norm ceiling
    #[serde(default = "default_max_grad_norm")]
    pub max_grad_norm: f64,

    /// Seed for weight init, sampling, dropout and exploration; random when unset
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub reward: RewardWeights,
}

fn default_state_size() -> usize {
    20
}
fn default_hidden_layers() -> Vec<usize> {
    vec![128, 128, 128]
}
fn default_dropout() -> f64 {
    0.2
}
fn default_learning_rate() -> f64 {
    0.001
}
fn default_gamma() -> f64 {
    0.95
}
fn default_epsilon_start() -> f64 {
    1.0
}
fn default_epsilon_min() -> f64 {
    0.01
}
fn default_epsilon_decay() -> f64 {
    0.995
}
fn default_buffer_capacity() -> usize {
    10000
}
fn default_batch_size() -> usize {
    32
}
fn default_target_sync_interval() -> u64 {
    100
}
fn default_max_grad_norm() -> f64 {
    1.0
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            state_size: default_state_size(),
            hidden_layers: default_hidden_layers(),
            dropout: default_dropout(),
            learning_rate: default_learning_rate(),
            gamma: default_gamma(),
            epsilon_start: default_epsilon_start(),
            epsilon_min: default_epsilon_min(),
            epsilon_decay: default_epsilon_decay(),
            buffer_capacity: default_buffer_capacity(),
            batch_size: default_batch_size(),
            target_sync_interval: default_target_sync_interval(),
            max_grad_norm: default_max_grad_norm(),
            seed: None,
            reward: RewardWeights::default(),
        }
    }
}

impl LearnerConfig {
    /// Fixed-seed configuration, mostly useful for tests and simulations
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Reject configurations that would corrupt training
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.state_size == 0 {
            problems.push("state_size must be positive".to_string());
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            problems.push("hidden layer widths must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            problems.push(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            problems.push(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            problems.push(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) || !(0.0..=1.0).contains(&self.epsilon_start)
        {
            problems.push("epsilon bounds must be in [0, 1]".to_string());
        }
        if self.epsilon_min > self.epsilon_start {
            problems.push(format!(
                "epsilon_min ({}) exceeds epsilon_start ({})",
                self.epsilon_min, self.epsilon_start
            ));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            problems.push(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            ));
        }
        if self.batch_size == 0 {
            problems.push("batch_size must be positive".to_string());
        }
        if self.buffer_capacity < self.batch_size {
            problems.push(format!(
                "buffer_capacity ({}) is smaller than batch_size ({})",
                self.buffer_capacity, self.batch_size
            ));
        }
        if self.target_sync_interval == 0 {
            problems.push("target_sync_interval must be positive".to_string());
        }
        if !(self.max_grad_norm.is_finite() && self.max_grad_norm > 0.0) {
            problems.push(format!(
                "max_grad_norm must be positive, got {}",
                self.max_grad_norm
            ));
        }
        if let Err(e) = self.reward.validate() {
            problems.push(e);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            let message = problems.join("; ");
            warn!("Rejected learner configuration: {}", message);
            Err(AdoptError::Config(message))
        }
    }
}

/// Business weights of the reward signal
///
/// The defaults are hardcoded assumptions carried over from the first
/// deployment; there is no derivation behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    #[serde(default = "default_ctr_weight")]
    pub ctr: f64,

    #[serde(default = "default_conversion_weight")]
    pub conversion: f64,

    #[serde(default = "default_roas_weight")]
    pub roas: f64,

    /// Penalty weight on spend increases
    #[serde(default = "default_cost_efficiency_weight")]
    pub cost_efficiency: f64,

    /// Revenue attributed to one conversion
    #[serde(default = "default_conversion_value")]
    pub conversion_value: f64,

    /// Spend delta that counts as one unit of penalty
    #[serde(default = "default_spend_scale")]
    pub spend_scale: f64,
}

fn default_ctr_weight() -> f64 {
    10.0
}
fn default_conversion_weight() -> f64 {
    15.0
}
fn default_roas_weight() -> f64 {
    20.0
}
fn default_cost_efficiency_weight() -> f64 {
    5.0
}
fn default_conversion_value() -> f64 {
    50.0
}
fn default_spend_scale() -> f64 {
    100.0
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            ctr: default_ctr_weight(),
            conversion: default_conversion_weight(),
            roas: default_roas_weight(),
            cost_efficiency: default_cost_efficiency_weight(),
            conversion_value: default_conversion_value(),
            spend_scale: default_spend_scale(),
        }
    }
}

impl RewardWeights {
    fn validate(&self) -> std::result::Result<(), String> {
        let all = [
            ("ctr", self.ctr),
            ("conversion", self.conversion),
            ("roas", self.roas),
            ("cost_efficiency", self.cost_efficiency),
            ("conversion_value", self.conversion_value),
        ];
        if let Some((name, value)) = all.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(format!("reward weight {name} must be finite and >= 0, got {value}"));
        }
        if !(self.spend_scale.is_finite() && self.spend_scale > 0.0) {
            return Err(format!(
                "reward spend_scale must be positive, got {}",
                self.spend_scale
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LearnerConfig::default();
        assert_eq!(config.state_size, 20);
        assert_eq!(config.hidden_layers, vec![128, 128, 128]);
        assert_eq!(config.gamma, 0.95);
        assert_eq!(config.epsilon_decay, 0.995);
        assert_eq!(config.buffer_capacity, 10000);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.target_sync_interval, 100);
        assert_eq!(config.reward.conversion_value, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: LearnerConfig =
            serde_json::from_str(r#"{"batch_size": 8, "reward": {"roas": 30.0}}"#).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.state_size, 20);
        assert_eq!(config.reward.roas, 30.0);
        assert_eq!(config.reward.ctr, 10.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LearnerConfig {
            batch_size: 64,
            buffer_capacity: 10,
            ..LearnerConfig::default()
        };
        assert!(matches!(config.validate(), Err(AdoptError::Config(_))));

        let config = LearnerConfig {
            epsilon_decay: 1.5,
            ..LearnerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LearnerConfig {
            dropout: 1.0,
            ..LearnerConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = LearnerConfig::default();
        config.reward.spend_scale = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seeded() {
        let config = LearnerConfig::seeded(7);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.batch_size, 32);
    }
}
