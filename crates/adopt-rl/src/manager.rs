//! Campaign optimization manager
//!
//! Ties one shared [`DqnLearner`] to any number of tracked campaigns. Each
//! campaign follows a two-phase protocol: [`run_optimization_cycle`] proposes
//! an action and remembers the state it was taken in, and
//! [`process_feedback`] later turns the observed effect into a transition and
//! a training step. Feedback without a pending proposal is answered with
//! [`FeedbackOutcome::NoPreviousState`] and does not touch the learner.
//!
//! Locking: the learner sits behind a `RwLock` (inference reads, training
//! writes), campaign records behind their own mutex. No method holds the
//! campaign mutex while waiting for the learner lock.
//!
//! [`run_optimization_cycle`]: CampaignOptimizationManager::run_optimization_cycle
//! [`process_feedback`]: CampaignOptimizationManager::process_feedback

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use adopt_core::{CampaignId, CampaignMetrics, Result};

use crate::action::{ActionSpace, Optimization};
use crate::algorithm::{DqnLearner, TrainingStats, TrainingSummary};
use crate::checkpoint::Checkpoint;
use crate::config::LearnerConfig;
use crate::experience::Experience;
use crate::reward::{Reward, RewardModel};
use crate::state::{StateEncoder, StateVector};

/// Mixed into the learner seed so exploration draws differ from sampling draws
const POLICY_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Action proposed for a campaign, waiting for feedback
#[derive(Debug, Clone)]
struct Proposal {
    state: StateVector,
    action: usize,
}

/// Per-campaign bookkeeping
#[derive(Debug, Clone)]
struct CampaignTracking {
    started_at: DateTime<Utc>,
    optimization_count: u64,
    feedback_count: u64,
    total_reward: f64,
    /// Reward accumulated since the last completed episode
    episode_reward: f64,
    episodes_completed: u64,
    previous_metrics: Option<CampaignMetrics>,
    pending: Option<Proposal>,
    last_action: Option<usize>,
}

impl CampaignTracking {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            optimization_count: 0,
            feedback_count: 0,
            total_reward: 0.0,
            episode_reward: 0.0,
            episodes_completed: 0,
            previous_metrics: None,
            pending: None,
            last_action: None,
        }
    }

    /// Take the pending proposal together with its baseline metrics
    fn take_pending(&mut self) -> Option<(Proposal, CampaignMetrics)> {
        let baseline = self.previous_metrics.clone()?;
        let proposal = self.pending.take()?;
        Some((proposal, baseline))
    }
}

/// Answer to `run_optimization_cycle`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub campaign_id: CampaignId,
    pub action: usize,
    pub optimization: Optimization,
    pub epsilon: f64,
    pub training_step: u64,
    pub state: StateVector,
}

/// What a feedback call learned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackReport {
    pub campaign_id: CampaignId,
    pub action: usize,
    pub reward: Reward,
    /// `None` while replay memory is smaller than one batch
    pub loss: Option<f64>,
    pub epsilon: f64,
    pub buffer_size: usize,
    pub training_step: u64,
    pub episode_completed: bool,
}

/// Result of a feedback call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Learned(FeedbackReport),
    /// No proposal is waiting for this campaign; nothing was learned
    NoPreviousState {
        campaign_id: CampaignId,
        message: String,
    },
}

impl FeedbackOutcome {
    pub fn is_learned(&self) -> bool {
        matches!(self, FeedbackOutcome::Learned(_))
    }

    pub fn report(&self) -> Option<&FeedbackReport> {
        match self {
            FeedbackOutcome::Learned(report) => Some(report),
            FeedbackOutcome::NoPreviousState { .. } => None,
        }
    }
}

/// Performance summary of one tracked campaign
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSummary {
    pub campaign_id: CampaignId,
    pub started_at: DateTime<Utc>,
    pub optimization_count: u64,
    pub feedback_count: u64,
    pub total_reward: f64,
    pub average_reward: f64,
    pub episode_reward: f64,
    pub episodes_completed: u64,
    pub last_action: Option<Optimization>,
    pub awaiting_feedback: bool,
}

/// Shared learner plus per-campaign tracking
pub struct CampaignOptimizationManager {
    learner: RwLock<DqnLearner>,
    encoder: StateEncoder,
    reward_model: RewardModel,
    actions: ActionSpace,
    /// Exploration draws
    policy_rng: Mutex<StdRng>,
    campaigns: Mutex<HashMap<CampaignId, CampaignTracking>>,
}

impl CampaignOptimizationManager {
    pub fn new(config: LearnerConfig) -> Result<Self> {
        let policy_rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ POLICY_SEED_SALT),
            None => StdRng::from_entropy(),
        };
        let encoder = StateEncoder::new(config.state_size);
        let reward_model = RewardModel::new(config.reward.clone());
        let learner = DqnLearner::new(config)?;

        Ok(Self {
            learner: RwLock::new(learner),
            encoder,
            reward_model,
            actions: ActionSpace,
            policy_rng: Mutex::new(policy_rng),
            campaigns: Mutex::new(HashMap::new()),
        })
    }

    /// Start tracking a campaign; returns false if it was already tracked
    pub fn start_optimization(&self, campaign_id: &CampaignId) -> bool {
        let mut campaigns = self.campaigns.lock();
        if campaigns.contains_key(campaign_id) {
            return false;
        }
        campaigns.insert(campaign_id.clone(), CampaignTracking::new());
        info!("Started optimization for campaign {}", campaign_id);
        true
    }

    /// Stop tracking a campaign, dropping any pending proposal
    pub fn forget_campaign(&self, campaign_id: &CampaignId) -> bool {
        let removed = self.campaigns.lock().remove(campaign_id).is_some();
        if removed {
            info!("Stopped optimization for campaign {}", campaign_id);
        }
        removed
    }

    pub fn is_tracking(&self, campaign_id: &CampaignId) -> bool {
        self.campaigns.lock().contains_key(campaign_id)
    }

    /// Tracked campaign ids in sorted order
    pub fn active_campaigns(&self) -> Vec<CampaignId> {
        let mut ids: Vec<CampaignId> = self.campaigns.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Propose an optimization for the campaign's current metrics.
    ///
    /// Unknown campaigns are started implicitly. Neither trains nor stores a
    /// transition.
    pub fn run_optimization_cycle(
        &self,
        campaign_id: &CampaignId,
        metrics: &CampaignMetrics,
    ) -> Recommendation {
        self.start_optimization(campaign_id);

        let state = self.encoder.encode(metrics);
        let (action, epsilon, training_step) = {
            let learner = self.learner.read();
            let mut rng = self.policy_rng.lock();
            let action = learner.select_action(&state, true, &mut *rng);
            (action, learner.epsilon(), learner.training_step())
        };
        let optimization = self.actions.describe_or_no_change(action);

        {
            let mut campaigns = self.campaigns.lock();
            let campaign = campaigns
                .entry(campaign_id.clone())
                .or_insert_with(CampaignTracking::new);
            campaign.pending = Some(Proposal {
                state: state.clone(),
                action,
            });
            campaign.last_action = Some(action);
            campaign.previous_metrics = Some(metrics.clone());
            campaign.optimization_count += 1;
        }

        debug!(
            "Recommended {} for campaign {} (epsilon {:.4})",
            optimization.kind, campaign_id, epsilon
        );

        Recommendation {
            campaign_id: campaign_id.clone(),
            action,
            optimization,
            epsilon,
            training_step,
            state,
        }
    }

    /// Learn from the metrics observed after the last proposal
    pub fn process_feedback(
        &self,
        campaign_id: &CampaignId,
        metrics: &CampaignMetrics,
    ) -> Result<FeedbackOutcome> {
        self.feedback(campaign_id, metrics, false)
    }

    /// Like `process_feedback`, but marks the transition terminal and closes the episode
    pub fn finish_episode(
        &self,
        campaign_id: &CampaignId,
        metrics: &CampaignMetrics,
    ) -> Result<FeedbackOutcome> {
        self.feedback(campaign_id, metrics, true)
    }

    fn feedback(
        &self,
        campaign_id: &CampaignId,
        metrics: &CampaignMetrics,
        done: bool,
    ) -> Result<FeedbackOutcome> {
        let pending = self
            .campaigns
            .lock()
            .get_mut(campaign_id)
            .and_then(CampaignTracking::take_pending);

        let Some((proposal, baseline)) = pending else {
            debug!("No pending proposal for campaign {}", campaign_id);
            return Ok(FeedbackOutcome::NoPreviousState {
                campaign_id: campaign_id.clone(),
                message: "No previous state to compare against".to_string(),
            });
        };

        let reward = self.reward_model.reward(&baseline, metrics, 0.0);
        let next_state = self.encoder.encode(metrics);
        let action = proposal.action;

        let (loss, epsilon, buffer_size, training_step) = {
            let mut learner = self.learner.write();
            learner.remember(Experience::new(
                proposal.state,
                action,
                reward,
                next_state,
                done,
            ))?;
            let loss = learner.train_step();
            (
                loss,
                learner.epsilon(),
                learner.buffer_len(),
                learner.training_step(),
            )
        };

        let episode_total = {
            let mut campaigns = self.campaigns.lock();
            campaigns.get_mut(campaign_id).and_then(|campaign| {
                campaign.feedback_count += 1;
                campaign.total_reward += reward;
                campaign.episode_reward += reward;
                campaign.previous_metrics = Some(metrics.clone());
                if done {
                    campaign.episodes_completed += 1;
                    Some(std::mem::take(&mut campaign.episode_reward))
                } else {
                    None
                }
            })
        };

        if let Some(total) = episode_total {
            self.learner.write().record_episode(total);
            info!(
                "Campaign {} completed an episode with reward {:.4}",
                campaign_id, total
            );
        }

        debug!(
            "Feedback for campaign {}: reward {:.4}, loss {:?}",
            campaign_id, reward, loss
        );

        Ok(FeedbackOutcome::Learned(FeedbackReport {
            campaign_id: campaign_id.clone(),
            action,
            reward,
            loss,
            epsilon,
            buffer_size,
            training_step,
            episode_completed: done,
        }))
    }

    pub fn campaign_summary(&self, campaign_id: &CampaignId) -> Option<CampaignSummary> {
        let campaigns = self.campaigns.lock();
        let campaign = campaigns.get(campaign_id)?;
        let average_reward = if campaign.feedback_count > 0 {
            campaign.total_reward / campaign.feedback_count as f64
        } else {
            0.0
        };

        Some(CampaignSummary {
            campaign_id: campaign_id.clone(),
            started_at: campaign.started_at,
            optimization_count: campaign.optimization_count,
            feedback_count: campaign.feedback_count,
            total_reward: campaign.total_reward,
            average_reward,
            episode_reward: campaign.episode_reward,
            episodes_completed: campaign.episodes_completed,
            last_action: campaign
                .last_action
                .map(|a| self.actions.describe_or_no_change(a)),
            awaiting_feedback: campaign.pending.is_some(),
        })
    }

    pub fn training_stats(&self) -> TrainingStats {
        self.learner.read().stats()
    }

    pub fn learner_params(&self) -> serde_json::Value {
        self.learner.read().params()
    }

    /// Extra training passes over replay memory
    pub fn train_epochs(&self, epochs: usize) -> TrainingSummary {
        self.learner.write().train_epochs(epochs)
    }

    /// Fails on an index outside the action table
    pub fn describe_action(&self, index: usize) -> Result<Optimization> {
        self.actions.describe(index)
    }

    pub fn encode(&self, metrics: &CampaignMetrics) -> StateVector {
        self.encoder.encode(metrics)
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        let checkpoint = self.learner.read().to_checkpoint();
        checkpoint.save(path)
    }

    /// Replace learned state from `path`; on error the live learner is untouched
    pub fn load_checkpoint(&self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint::load(path)?;
        let mut learner = self.learner.write();
        learner.restore(checkpoint)?;
        info!(
            "Loaded checkpoint from {} (step {}, epsilon {:.4})",
            path.display(),
            learner.training_step(),
            learner.epsilon()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> LearnerConfig {
        LearnerConfig {
            hidden_layers: vec![32, 32],
            batch_size: 2,
            buffer_capacity: 100,
            seed: Some(17),
            ..LearnerConfig::default()
        }
    }

    fn create_test_manager() -> CampaignOptimizationManager {
        CampaignOptimizationManager::new(small_config()).unwrap()
    }

    fn metrics(ctr: f64, spend: f64) -> CampaignMetrics {
        CampaignMetrics {
            impressions: Some(10_000.0),
            clicks: Some(ctr * 10_000.0),
            conversions: Some(5.0),
            spend: Some(spend),
            ctr: Some(ctr),
            conversion_rate: Some(0.05),
            platform: Some("facebook".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let manager = create_test_manager();
        let id = CampaignId::from("c-1");
        assert!(manager.start_optimization(&id));
        assert!(!manager.start_optimization(&id));
        assert_eq!(manager.active_campaigns(), vec![id]);
    }

    #[test]
    fn test_feedback_without_cycle_is_informational() {
        let manager = create_test_manager();
        let id = CampaignId::from("never-cycled");
        let before = manager.training_stats();

        let outcome = manager.process_feedback(&id, &metrics(0.02, 100.0)).unwrap();
        assert!(matches!(outcome, FeedbackOutcome::NoPreviousState { .. }));
        assert!(!outcome.is_learned());
        assert_eq!(manager.training_stats(), before);

        manager.start_optimization(&id);
        let outcome = manager.process_feedback(&id, &metrics(0.02, 100.0)).unwrap();
        assert!(outcome.report().is_none());
        assert_eq!(manager.training_stats().buffer_size, 0);
    }

    #[test]
    fn test_cycle_auto_starts_without_completing_episodes() {
        let manager = create_test_manager();
        let id = CampaignId::from("brand-new");
        assert!(!manager.is_tracking(&id));

        let rec = manager.run_optimization_cycle(&id, &metrics(0.02, 100.0));
        assert!(manager.is_tracking(&id));
        assert!(rec.action < ActionSpace::SIZE);
        assert_eq!(rec.state.len(), 20);
        assert_eq!(rec.training_step, 0);

        let stats = manager.training_stats();
        assert_eq!(stats.total_episodes, 0);
        assert_eq!(stats.buffer_size, 0);
    }

    #[test]
    fn test_feedback_consumes_the_proposal() {
        let manager = create_test_manager();
        let id = CampaignId::from("c-2");
        let rec = manager.run_optimization_cycle(&id, &metrics(0.02, 100.0));

        let outcome = manager.process_feedback(&id, &metrics(0.03, 100.0)).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.action, rec.action);
        assert!(report.reward > 0.0);
        assert!(report.loss.is_none());
        assert_eq!(report.buffer_size, 1);

        // second feedback for the same proposal has nothing to compare against
        let again = manager.process_feedback(&id, &metrics(0.04, 100.0)).unwrap();
        assert!(!again.is_learned());
        assert_eq!(manager.training_stats().buffer_size, 1);
    }

    #[test]
    fn test_training_starts_once_batch_is_full() {
        let manager = create_test_manager();
        let id = CampaignId::from("c-3");

        manager.run_optimization_cycle(&id, &metrics(0.02, 100.0));
        let first = manager.process_feedback(&id, &metrics(0.025, 100.0)).unwrap();
        assert!(first.report().unwrap().loss.is_none());

        manager.run_optimization_cycle(&id, &metrics(0.025, 100.0));
        let second = manager.process_feedback(&id, &metrics(0.02, 120.0)).unwrap();
        let report = second.report().unwrap();
        assert!(report.loss.unwrap().is_finite());
        assert_eq!(report.training_step, 1);
        assert!(report.epsilon < 1.0);
    }

    #[test]
    fn test_finish_episode_records_reward() {
        let manager = create_test_manager();
        let id = CampaignId::from("c-4");

        manager.run_optimization_cycle(&id, &metrics(0.02, 100.0));
        manager.process_feedback(&id, &metrics(0.03, 100.0)).unwrap();
        manager.run_optimization_cycle(&id, &metrics(0.03, 100.0));
        let outcome = manager.finish_episode(&id, &metrics(0.03, 100.0)).unwrap();
        assert!(outcome.report().unwrap().episode_completed);

        let stats = manager.training_stats();
        assert_eq!(stats.total_episodes, 1);

        let summary = manager.campaign_summary(&id).unwrap();
        assert_eq!(summary.episodes_completed, 1);
        assert_eq!(summary.episode_reward, 0.0);
        assert_eq!(summary.feedback_count, 2);
        assert!((stats.average_reward - summary.total_reward).abs() < 1e-12);
    }

    #[test]
    fn test_campaign_summary() {
        let manager = create_test_manager();
        let id = CampaignId::from("c-5");
        assert!(manager.campaign_summary(&id).is_none());

        let rec = manager.run_optimization_cycle(&id, &metrics(0.02, 100.0));
        let summary = manager.campaign_summary(&id).unwrap();
        assert_eq!(summary.optimization_count, 1);
        assert_eq!(summary.feedback_count, 0);
        assert!(summary.awaiting_feedback);
        assert_eq!(summary.last_action, Some(rec.optimization));

        manager.process_feedback(&id, &metrics(0.02, 100.0)).unwrap();
        let summary = manager.campaign_summary(&id).unwrap();
        assert!(!summary.awaiting_feedback);
        assert_eq!(summary.feedback_count, 1);
    }

    #[test]
    fn test_forget_campaign() {
        let manager = create_test_manager();
        let id = CampaignId::from("c-6");
        manager.run_optimization_cycle(&id, &metrics(0.02, 100.0));

        assert!(manager.forget_campaign(&id));
        assert!(!manager.forget_campaign(&id));
        assert!(!manager.is_tracking(&id));

        let outcome = manager.process_feedback(&id, &metrics(0.03, 100.0)).unwrap();
        assert!(!outcome.is_learned());
    }

    #[test]
    fn test_describe_action() {
        let manager = create_test_manager();
        assert!(manager.describe_action(3).is_ok());
        assert!(manager.describe_action(10).is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = FeedbackOutcome::NoPreviousState {
            campaign_id: CampaignId::from("x"),
            message: "No previous state to compare against".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_previous_state");
        assert_eq!(json["campaign_id"], "x");
    }
}
