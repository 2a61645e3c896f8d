//! Reward shaping from before/after campaign metrics

use serde::{Deserialize, Serialize};

use adopt_core::CampaignMetrics;

use crate::config::RewardWeights;

/// Reward value in [-1, 1]
pub type Reward = f64;

/// Individual terms of a reward computation, before squashing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub ctr_term: f64,
    pub conversion_term: f64,
    pub roas_term: f64,
    pub spend_penalty: f64,
    pub optimization_cost: f64,
    /// Sum of the terms above
    pub raw_score: f64,
    /// `tanh(raw_score)`
    pub reward: Reward,
}

/// Converts the effect of an optimization into a bounded scalar reward
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardModel {
    weights: RewardWeights,
}

impl RewardModel {
    pub fn new(weights: RewardWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    /// Reward for moving from `previous` to `current`
    pub fn reward(
        &self,
        previous: &CampaignMetrics,
        current: &CampaignMetrics,
        optimization_cost: f64,
    ) -> Reward {
        self.breakdown(previous, current, optimization_cost).reward
    }

    pub fn breakdown(
        &self,
        previous: &CampaignMetrics,
        current: &CampaignMetrics,
        optimization_cost: f64,
    ) -> RewardBreakdown {
        let w = &self.weights;

        let ctr_term = w.ctr * relative_improvement(previous.ctr(), current.ctr());
        let conversion_term = w.conversion
            * relative_improvement(previous.conversion_rate(), current.conversion_rate());
        let roas_term = w.roas * relative_improvement(self.roas(previous), self.roas(current));

        // Spend increases are penalized; spend decreases earn nothing directly
        let spend_delta = current.spend() - previous.spend();
        let spend_penalty = w.cost_efficiency * (spend_delta / w.spend_scale).max(0.0);

        let optimization_cost = if optimization_cost.is_finite() {
            optimization_cost
        } else {
            0.0
        };

        let raw_score = ctr_term + conversion_term + roas_term - spend_penalty - optimization_cost;
        let reward = if raw_score.is_nan() {
            0.0
        } else {
            raw_score.tanh()
        };

        RewardBreakdown {
            ctr_term,
            conversion_term,
            roas_term,
            spend_penalty,
            optimization_cost,
            raw_score,
            reward,
        }
    }

    /// Return on ad spend; 0 without spend
    pub fn roas(&self, metrics: &CampaignMetrics) -> f64 {
        let spend = metrics.spend();
        if spend > 0.0 {
            metrics.conversions() * self.weights.conversion_value / spend
        } else {
            0.0
        }
    }
}

/// `(current - previous) / previous`, or 0 when there is no positive baseline
fn relative_improvement(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous
    } else {
        0.0
    }
}
