//! Error types for adopt

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for adopt
///
/// Missing or malformed metric fields are never reported through this type;
/// they are defaulted at the encoder and reward boundaries instead.
#[derive(Error, Debug)]
pub enum AdoptError {
    #[error("Invalid action index {index} (action space has {action_count} actions)")]
    InvalidAction { index: usize, action_count: usize },

    #[error("Invalid reward {reward} (must be finite and within [-1, 1])")]
    InvalidReward { reward: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint shape mismatch: {0}")]
    CheckpointShape(String),

    #[error("Checkpoint I/O error at {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdoptError {
    /// Wrap an I/O failure on a checkpoint file with its path
    pub fn checkpoint(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Checkpoint {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for adopt operations
pub type Result<T> = std::result::Result<T, AdoptError>;
