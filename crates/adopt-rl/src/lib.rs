//! adopt RL - Reinforcement learning engine for campaign optimization
//!
//! This crate provides a Deep Q-Network learner that recommends budget, bid,
//! audience, creative and schedule changes for running campaigns and learns
//! from the measured effect of each recommendation.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod action;
pub mod algorithm;
pub mod checkpoint;
pub mod config;
pub mod experience;
pub mod manager;
pub mod network;
pub mod optimizer;
pub mod reward;
pub mod service;
pub mod state;

pub use action::{ActionSpace, Optimization, OptimizationAction, OptimizationValue};
pub use algorithm::{DqnLearner, TrainingStats, TrainingSummary};
pub use checkpoint::Checkpoint;
pub use config::{LearnerConfig, RewardWeights};
pub use experience::{Experience, ExperienceBuffer};
pub use manager::{
    CampaignOptimizationManager, CampaignSummary, FeedbackOutcome, FeedbackReport, Recommendation,
};
pub use network::{NetworkShape, QNetwork, ValueFunction};
pub use reward::{Reward, RewardBreakdown, RewardModel};
pub use service::OptimizationService;
pub use state::{StateEncoder, StateVector};
