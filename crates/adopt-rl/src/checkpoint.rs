//! On-disk learner snapshots
//!
//! A checkpoint is a single JSON document holding both parameter sets, the
//! optimizer moments and the training counters. Saving goes through a sibling
//! temp file and a rename so a crash never leaves a half-written checkpoint.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use adopt_core::{AdoptError, Result};

use crate::network::{NetworkShape, QNetwork};
use crate::optimizer::Adam;

/// Current checkpoint layout
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub shape: NetworkShape,
    pub online: QNetwork,
    pub target: QNetwork,
    pub optimizer: Adam,
    pub epsilon: f64,
    pub training_step: u64,
    pub episode_rewards: Vec<f64>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Write the checkpoint as JSON, replacing any file at `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AdoptError::checkpoint(parent, e))?;
        }

        let tmp = temp_path(path);
        fs::write(&tmp, &bytes).map_err(|e| AdoptError::checkpoint(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(AdoptError::checkpoint(path, e));
        }

        info!(
            "Saved checkpoint to {} (step {}, {} bytes)",
            path.display(),
            self.training_step,
            bytes.len()
        );
        Ok(())
    }

    /// Read a checkpoint; shape is not checked here, see [`Checkpoint::validate`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| AdoptError::checkpoint(path, e))?;
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        Ok(checkpoint)
    }

    /// Reject checkpoints that do not fit a learner of shape `expected`
    pub fn validate(&self, expected: &NetworkShape) -> Result<()> {
        if self.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(AdoptError::CheckpointShape(format!(
                "unsupported checkpoint format version {} (expected {})",
                self.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        if &self.shape != expected {
            return Err(AdoptError::CheckpointShape(format!(
                "checkpoint network is {}, learner is {}",
                self.shape, expected
            )));
        }
        self.online.validate(expected)?;
        self.target.validate(expected)?;
        self.optimizer.validate(&self.online)?;

        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(AdoptError::CheckpointShape(format!(
                "epsilon {} is outside [0, 1]",
                self.epsilon
            )));
        }
        if self.episode_rewards.iter().any(|r| !r.is_finite()) {
            return Err(AdoptError::CheckpointShape(
                "episode rewards contain non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
