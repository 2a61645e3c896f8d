//! Async wrapper around the campaign optimization manager
//!
//! Every call is CPU-bound, so it runs on tokio's blocking pool instead of
//! the I/O event loop.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use adopt_core::{AdoptError, CampaignId, CampaignMetrics, Result};

use crate::algorithm::{TrainingStats, TrainingSummary};
use crate::config::LearnerConfig;
use crate::manager::{
    CampaignOptimizationManager, CampaignSummary, FeedbackOutcome, Recommendation,
};

/// Optimization service for async hosts
#[derive(Clone)]
pub struct OptimizationService {
    manager: Arc<CampaignOptimizationManager>,
}

impl OptimizationService {
    pub fn new(config: LearnerConfig) -> Result<Self> {
        let manager = CampaignOptimizationManager::new(config)?;
        info!("Optimization service initialized");
        Ok(Self::from_manager(Arc::new(manager)))
    }

    pub fn from_manager(manager: Arc<CampaignOptimizationManager>) -> Self {
        Self { manager }
    }

    /// Shared handle for synchronous callers
    pub fn manager(&self) -> &Arc<CampaignOptimizationManager> {
        &self.manager
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CampaignOptimizationManager) -> Result<T> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || f(&*manager))
            .await
            .map_err(|e| AdoptError::Internal(format!("optimization task failed: {e}")))?
    }

    pub async fn start_optimization(&self, campaign_id: CampaignId) -> Result<bool> {
        self.blocking(move |m| Ok(m.start_optimization(&campaign_id)))
            .await
    }

    pub async fn forget_campaign(&self, campaign_id: CampaignId) -> Result<bool> {
        self.blocking(move |m| Ok(m.forget_campaign(&campaign_id)))
            .await
    }

    pub async fn run_optimization_cycle(
        &self,
        campaign_id: CampaignId,
        metrics: CampaignMetrics,
    ) -> Result<Recommendation> {
        self.blocking(move |m| Ok(m.run_optimization_cycle(&campaign_id, &metrics)))
            .await
    }

    pub async fn process_feedback(
        &self,
        campaign_id: CampaignId,
        metrics: CampaignMetrics,
    ) -> Result<FeedbackOutcome> {
        self.blocking(move |m| m.process_feedback(&campaign_id, &metrics))
            .await
    }

    pub async fn finish_episode(
        &self,
        campaign_id: CampaignId,
        metrics: CampaignMetrics,
    ) -> Result<FeedbackOutcome> {
        self.blocking(move |m| m.finish_episode(&campaign_id, &metrics))
            .await
    }

    pub async fn campaign_summary(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<CampaignSummary>> {
        self.blocking(move |m| Ok(m.campaign_summary(&campaign_id)))
            .await
    }

    pub async fn active_campaigns(&self) -> Result<Vec<CampaignId>> {
        self.blocking(|m| Ok(m.active_campaigns())).await
    }

    pub async fn training_stats(&self) -> Result<TrainingStats> {
        self.blocking(|m| Ok(m.training_stats())).await
    }

    pub async fn train_epochs(&self, epochs: usize) -> Result<TrainingSummary> {
        self.blocking(move |m| Ok(m.train_epochs(epochs))).await
    }

    pub async fn save_checkpoint(&self, path: PathBuf) -> Result<()> {
        self.blocking(move |m| m.save_checkpoint(&path)).await
    }

    pub async fn load_checkpoint(&self, path: PathBuf) -> Result<()> {
        self.blocking(move |m| m.load_checkpoint(&path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> OptimizationService {
        let config = LearnerConfig {
            hidden_layers: vec![16],
            batch_size: 2,
            buffer_capacity: 16,
            seed: Some(3),
            ..LearnerConfig::default()
        };
        OptimizationService::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_service_basic() {
        let service = create_test_service();
        let stats = service.training_stats().await.unwrap();
        assert_eq!(stats.training_step, 0);
        assert_eq!(stats.compute_backend, "cpu");
    }

    #[tokio::test]
    async fn test_service_cycle_and_feedback() {
        let service = create_test_service();
        let id = CampaignId::from("svc-1");
        let metrics = CampaignMetrics {
            ctr: Some(0.02),
            spend: Some(50.0),
            ..Default::default()
        };

        let rec = service
            .run_optimization_cycle(id.clone(), metrics.clone())
            .await
            .unwrap();
        assert_eq!(rec.campaign_id, id);

        let outcome = service.process_feedback(id.clone(), metrics).await.unwrap();
        assert!(outcome.is_learned());
        assert_eq!(service.active_campaigns().await.unwrap(), vec![id.clone()]);
        assert!(service.forget_campaign(id).await.unwrap());
    }
}
