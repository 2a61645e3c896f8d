//! Deep Q-Network learner
//!
//! Owns the online and target networks, the replay memory, the optimizer and
//! the exploration schedule. All parameter mutation goes through `&mut self`,
//! so a single lock around the learner serializes training steps.

use std::path::Path;

use chrono::Utc;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use adopt_core::{AdoptError, Result};

use crate::action::ActionSpace;
use crate::checkpoint::{Checkpoint, CHECKPOINT_FORMAT_VERSION};
use crate::config::LearnerConfig;
use crate::experience::{Experience, ExperienceBuffer};
use crate::network::{argmax, NetworkShape, QNetwork, ValueFunction};
use crate::optimizer::Adam;
use crate::state::StateVector;

/// Completed episodes considered by the running average
const REWARD_WINDOW: usize = 100;

/// DQN with experience replay and a hard-synced target network
pub struct DqnLearner {
    config: LearnerConfig,
    online: QNetwork,
    target: QNetwork,
    optimizer: Adam,
    buffer: ExperienceBuffer,
    epsilon: f64,
    training_step: u64,
    episode_rewards: Vec<f64>,
    /// Gradient norm of the last training step, before clipping
    last_grad_norm: Option<f64>,
    /// Drives batch sampling and dropout masks
    rng: StdRng,
}

impl DqnLearner {
    pub fn new(config: LearnerConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let shape = Self::shape_for(&config);
        let online = QNetwork::new(&shape, config.dropout, &mut rng);
        let target = online.clone();
        let optimizer = Adam::new(&online, config.learning_rate);

        info!(
            "DQN learner ready: network {}, {} parameters, batch {}, buffer {}",
            shape,
            online.parameter_count(),
            config.batch_size,
            config.buffer_capacity
        );

        Ok(Self {
            buffer: ExperienceBuffer::new(config.buffer_capacity),
            epsilon: config.epsilon_start,
            training_step: 0,
            episode_rewards: Vec::new(),
            last_grad_norm: None,
            online,
            target,
            optimizer,
            config,
            rng,
        })
    }

    fn shape_for(config: &LearnerConfig) -> NetworkShape {
        NetworkShape::new(config.state_size, &config.hidden_layers, ActionSpace::SIZE)
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn shape(&self) -> NetworkShape {
        Self::shape_for(&self.config)
    }

    pub fn online(&self) -> &QNetwork {
        &self.online
    }

    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn training_step(&self) -> u64 {
        self.training_step
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }

    /// Unclipped gradient norm of the most recent training step
    pub fn last_grad_norm(&self) -> Option<f64> {
        self.last_grad_norm
    }

    /// Q-values of the online network, dropout disabled
    pub fn q_values(&self, state: &StateVector) -> Array1<f64> {
        self.online.q_values(state.as_slice())
    }

    /// Best action under the online network; ties go to the lowest index
    pub fn greedy_action(&self, state: &StateVector) -> usize {
        argmax(&self.q_values(state))
    }

    /// Epsilon-greedy selection. Never changes epsilon.
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        state: &StateVector,
        training: bool,
        rng: &mut R,
    ) -> usize {
        if training && rng.gen::<f64>() < self.epsilon {
            rng.gen_range(0..ActionSpace::SIZE)
        } else {
            self.greedy_action(state)
        }
    }

    /// Store a transition in replay memory
    pub fn remember(&mut self, experience: Experience) -> Result<()> {
        if experience.action >= ActionSpace::SIZE {
            return Err(AdoptError::InvalidAction {
                index: experience.action,
                action_count: ActionSpace::SIZE,
            });
        }
        if !experience.reward.is_finite() || experience.reward.abs() > 1.0 {
            return Err(AdoptError::InvalidReward {
                reward: experience.reward,
            });
        }
        self.buffer.push(experience);
        Ok(())
    }

    /// One gradient step on a sampled batch.
    ///
    /// Returns `None` without touching any state while the buffer holds fewer
    /// than `batch_size` transitions.
    pub fn train_step(&mut self) -> Option<f64> {
        let batch_size = self.config.batch_size;
        if self.buffer.len() < batch_size {
            return None;
        }
        let batch = self.buffer.sample(batch_size, &mut self.rng);
        if batch.is_empty() {
            return None;
        }

        let n = batch.len();
        let size = self.config.state_size;
        let states = stack_states(batch.iter().map(|e| &e.state), n, size);
        let next_states = stack_states(batch.iter().map(|e| &e.next_state), n, size);

        // Bellman targets from the frozen network
        let next_q = self.target.forward_batch(&next_states);
        let gamma = self.config.gamma;
        let targets: Vec<f64> = batch
            .iter()
            .zip(next_q.rows())
            .map(|(e, row)| {
                let best_next = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mask = if e.done { 0.0 } else { 1.0 };
                e.reward + gamma * best_next * mask
            })
            .collect();

        let cache = self.online.forward_train(&states, &mut self.rng);

        // MSE over the taken actions only
        let mut grad_output = Array2::zeros(cache.output.dim());
        let mut loss = 0.0;
        for (i, (e, target)) in batch.iter().zip(&targets).enumerate() {
            let diff = cache.output[[i, e.action]] - target;
            loss += diff * diff;
            grad_output[[i, e.action]] = 2.0 * diff / n as f64;
        }
        loss /= n as f64;

        let mut gradients = self.online.backward(&cache, &grad_output);
        let grad_norm = gradients.clip_norm(self.config.max_grad_norm);
        self.optimizer.step(&mut self.online, &gradients);
        self.last_grad_norm = Some(grad_norm);

        self.training_step += 1;
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);

        if self.training_step % self.config.target_sync_interval == 0 {
            self.sync_target();
        }

        debug!(
            "Training step {} complete, loss: {:.6}, grad norm: {:.4}, epsilon: {:.4}",
            self.training_step, loss, grad_norm, self.epsilon
        );

        Some(loss)
    }

    /// Hard-copy online parameters into the target network
    pub fn sync_target(&mut self) {
        self.target.copy_from(&self.online);
        info!("Target network synced at step {}", self.training_step);
    }

    /// Close an episode with its accumulated reward
    pub fn record_episode(&mut self, total_reward: f64) {
        let total_reward = if total_reward.is_finite() {
            total_reward
        } else {
            0.0
        };
        self.episode_rewards.push(total_reward);
    }

    /// Run up to `epochs` training steps on the current replay memory
    pub fn train_epochs(&mut self, epochs: usize) -> TrainingSummary {
        let mut losses = Vec::with_capacity(epochs);
        for _ in 0..epochs {
            match self.train_step() {
                Some(loss) => losses.push(loss),
                // Replay memory does not grow between steps
                None => break,
            }
        }

        let average_loss = if losses.is_empty() {
            None
        } else {
            Some(losses.iter().sum::<f64>() / losses.len() as f64)
        };

        info!(
            "Trained {}/{} epochs, average loss: {:?}",
            losses.len(),
            epochs,
            average_loss
        );

        TrainingSummary {
            epochs_requested: epochs,
            epochs_trained: losses.len(),
            average_loss,
            epsilon: self.epsilon,
            training_step: self.training_step,
        }
    }

    /// Read-only snapshot of the training counters
    pub fn stats(&self) -> TrainingStats {
        let skip = self.episode_rewards.len().saturating_sub(REWARD_WINDOW);
        let recent = &self.episode_rewards[skip..];
        let average_reward = if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        };

        TrainingStats {
            training_step: self.training_step,
            epsilon: self.epsilon,
            buffer_size: self.buffer.len(),
            average_reward,
            total_episodes: self.episode_rewards.len(),
            compute_backend: "cpu".to_string(),
        }
    }

    /// Hyperparameters as JSON
    pub fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "network": self.shape().to_string(),
            "parameters": self.online.parameter_count(),
            "learning_rate": self.optimizer.learning_rate(),
            "gamma": self.config.gamma,
            "epsilon": self.epsilon,
            "epsilon_min": self.config.epsilon_min,
            "epsilon_decay": self.config.epsilon_decay,
            "batch_size": self.config.batch_size,
            "target_sync_interval": self.config.target_sync_interval,
            "max_grad_norm": self.config.max_grad_norm,
        })
    }

    pub fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            format_version: CHECKPOINT_FORMAT_VERSION,
            shape: self.shape(),
            online: self.online.clone(),
            target: self.target.clone(),
            optimizer: self.optimizer.clone(),
            epsilon: self.epsilon,
            training_step: self.training_step,
            episode_rewards: self.episode_rewards.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Replace learned state with `checkpoint`; nothing changes if it does not fit
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        checkpoint.validate(&self.shape())?;

        self.online = checkpoint.online;
        self.target = checkpoint.target;
        self.optimizer = checkpoint.optimizer;
        self.epsilon = checkpoint.epsilon;
        self.training_step = checkpoint.training_step;
        self.episode_rewards = checkpoint.episode_rewards;
        Ok(())
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        self.to_checkpoint().save(path)
    }

    pub fn load_checkpoint(&mut self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint::load(path)?;
        self.restore(checkpoint)?;
        info!(
            "Loaded checkpoint from {} (step {}, epsilon {:.4})",
            path.display(),
            self.training_step,
            self.epsilon
        );
        Ok(())
    }
}

fn stack_states<'a>(
    states: impl Iterator<Item = &'a StateVector>,
    rows: usize,
    size: usize,
) -> Array2<f64> {
    let mut out = Array2::zeros((rows, size));
    for (mut row, state) in out.rows_mut().into_iter().zip(states) {
        row.assign(&state.to_input(size));
    }
    out
}

/// Training statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStats {
    pub training_step: u64,
    pub epsilon: f64,
    pub buffer_size: usize,
    /// Mean reward of the last 100 completed episodes
    pub average_reward: f64,
    pub total_episodes: usize,
    pub compute_backend: String,
}

/// Outcome of a manual training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub epochs_requested: usize,
    pub epochs_trained: usize,
    pub average_loss: Option<f64>,
    pub epsilon: f64,
    pub training_step: u64,
}
