//! CLI command modules

pub mod config;
pub mod recommend;
pub mod simulate;
pub mod stats;
pub mod train;

use anyhow::{Context, Result};
use tracing::{info, warn};

use adopt_rl::{CampaignOptimizationManager, DqnLearner};

use crate::config::Config;

/// Manager restored from the configured checkpoint, if one exists
pub fn open_manager(config: &Config) -> Result<CampaignOptimizationManager> {
    let manager = CampaignOptimizationManager::new(config.learner.clone())
        .context("Failed to create optimization manager")?;

    let path = &config.checkpoint.path;
    if path.exists() {
        manager
            .load_checkpoint(path)
            .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
    } else {
        info!("No checkpoint at {}, starting fresh", path.display());
    }
    Ok(manager)
}

/// Learner restored from the configured checkpoint, if one exists
pub fn open_learner(config: &Config) -> Result<DqnLearner> {
    let mut learner =
        DqnLearner::new(config.learner.clone()).context("Failed to create learner")?;

    let path = &config.checkpoint.path;
    if path.exists() {
        learner
            .load_checkpoint(path)
            .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
    }
    Ok(learner)
}

/// Save after a mutating command unless autosave is off or the caller opted out
pub fn autosave(
    config: &Config,
    skip: bool,
    save: impl FnOnce() -> adopt_core::Result<()>,
) -> Result<()> {
    if skip || !config.checkpoint.autosave {
        warn!("Checkpoint not saved; learned state is discarded");
        return Ok(());
    }
    let path = &config.checkpoint.path;
    save().with_context(|| format!("Failed to save checkpoint {}", path.display()))?;
    println!("Checkpoint saved: {}", path.display());
    Ok(())
}
