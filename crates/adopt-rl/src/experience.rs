//! Experience replay buffer for the DQN learner

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::reward::Reward;
use crate::state::StateVector;

/// A single experience tuple (s, a, r, s', done)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: StateVector,
    pub action: usize,
    pub reward: Reward,
    pub next_state: StateVector,
    pub done: bool,
}

impl Experience {
    pub fn new(
        state: StateVector,
        action: usize,
        reward: Reward,
        next_state: StateVector,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// Bounded FIFO replay memory
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl ExperienceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an experience, evicting the oldest one when full
    pub fn push(&mut self, experience: Experience) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Uniform sample of `batch_size` distinct experiences.
    ///
    /// Returns nothing when fewer than `batch_size` experiences are stored.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Experience> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return Vec::new();
        }
        rand::seq::index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| self.buffer[i].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }
}

impl Default for ExperienceBuffer {
    fn default() -> Self {
        Self::new(10000)
    }
}
