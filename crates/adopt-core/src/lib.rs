//! adopt Core - Campaign types, metrics model, and shared functionality
//!
//! This crate provides the foundational types used across the adopt
//! campaign-optimization components.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod campaign;
pub mod error;
pub mod metrics;
pub mod util;

pub use campaign::CampaignId;
pub use error::{AdoptError, Result};
pub use metrics::{CampaignMetrics, SentimentBreakdown, TargetAudience};
