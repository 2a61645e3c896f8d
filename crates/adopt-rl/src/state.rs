//! State encoding for the Q-network
//!
//! Campaign snapshots are flattened into a fixed-length feature vector in
//! this order:
//!
//! | idx | feature                                    |
//! |-----|--------------------------------------------|
//! | 0-5 | impressions/1e4, clicks/1e3, conversions/1e2, ctr, conversion rate, spend/1e3 |
//! | 6-7 | hour of day, day of week (both in [0, 1))  |
//! | 8   | interest count / 10                        |
//! | 9-11| technology, lifestyle, business interest flags |
//! | 12-15 | facebook, instagram, twitter, linkedin indicator |
//! | 16-18 | positive, negative, neutral sentiment share |
//!
//! Shorter vectors are zero-padded to the configured size, longer ones truncated.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use adopt_core::CampaignMetrics;

/// Number of features produced before padding
pub const FEATURE_COUNT: usize = 19;

/// Interest categories with a dedicated flag
pub const INTEREST_CATEGORIES: [&str; 3] = ["technology", "lifestyle", "business"];

/// Platforms with a dedicated indicator
pub const PLATFORMS: [&str; 4] = ["facebook", "instagram", "twitter", "linkedin"];

/// Fixed-length, all-finite feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateVector(Vec<f64>);

impl StateVector {
    /// Pad or truncate `features` to `size`, replacing non-finite entries with 0
    pub fn fit(mut features: Vec<f64>, size: usize) -> Self {
        features.resize(size, 0.0);
        for value in &mut features {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        Self(features)
    }

    /// All-zero state of the given size
    pub fn zeros(size: usize) -> Self {
        Self(vec![0.0; size])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Copy into a network input row of exactly `size` entries
    pub fn to_input(&self, size: usize) -> Array1<f64> {
        Array1::from_shape_fn(size, |i| self.0.get(i).copied().unwrap_or(0.0))
    }
}

/// Maps campaign metrics into the learner's state space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateEncoder {
    state_size: usize,
}

impl StateEncoder {
    pub fn new(state_size: usize) -> Self {
        Self { state_size }
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Encode a metrics snapshot; never fails and is deterministic
    pub fn encode(&self, metrics: &CampaignMetrics) -> StateVector {
        StateVector::fit(Self::features(metrics), self.state_size)
    }

    /// Unpadded feature list in table order
    pub fn features(metrics: &CampaignMetrics) -> Vec<f64> {
        let mut features = Vec::with_capacity(FEATURE_COUNT);

        // Performance counters
        features.push(metrics.impressions() / 10_000.0);
        features.push(metrics.clicks() / 1_000.0);
        features.push(metrics.conversions() / 100.0);
        features.push(metrics.ctr());
        features.push(metrics.conversion_rate());
        features.push(metrics.spend() / 1_000.0);

        // Time of observation
        features.push(metrics.hour_fraction());
        features.push(metrics.weekday_fraction());

        // Audience shape
        match &metrics.target_audience {
            Some(audience) => {
                features.push(audience.interest_count() as f64 / 10.0);
                for category in INTEREST_CATEGORIES {
                    features.push(flag(audience.mentions(category)));
                }
            }
            None => features.extend([0.0; 4]),
        }

        // Platform indicator
        let platform = metrics.platform();
        for candidate in PLATFORMS {
            features.push(flag(platform == candidate));
        }

        // Sentiment
        features.push(metrics.positive_ratio());
        features.push(metrics.negative_ratio());
        features.push(metrics.neutral_ratio());

        features
    }
}

impl Default for StateEncoder {
    fn default() -> Self {
        Self::new(20)
    }
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}
