//! Integration tests for the optimization engine
//!
//! These tests drive the public API end to end: propose/feedback cycles,
//! checkpoint round-trips and concurrent access from many campaigns.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use std::sync::Arc;

use adopt_core::{AdoptError, CampaignId, CampaignMetrics, SentimentBreakdown};
use adopt_rl::{
    CampaignOptimizationManager, DqnLearner, Experience, LearnerConfig,
    OptimizationService, StateVector,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn test_config(seed: u64) -> LearnerConfig {
    LearnerConfig {
        hidden_layers: vec![32, 32, 32],
        batch_size: 8,
        buffer_capacity: 256,
        target_sync_interval: 10,
        seed: Some(seed),
        ..LearnerConfig::default()
    }
}

/// Helper function to create campaign metrics
fn create_test_metrics(ctr: f64, conversion_rate: f64, spend: f64) -> CampaignMetrics {
    CampaignMetrics {
        impressions: Some(50_000.0),
        clicks: Some(50_000.0 * ctr),
        conversions: Some(50_000.0 * ctr * conversion_rate),
        spend: Some(spend),
        ctr: Some(ctr),
        conversion_rate: Some(conversion_rate),
        platform: Some("linkedin".into()),
        sentiment: Some(SentimentBreakdown {
            positive_ratio: Some(0.7),
            negative_ratio: Some(0.1),
            neutral_ratio: Some(0.2),
        }),
        ..Default::default()
    }
}

fn seeded_transitions(learner: &mut DqnLearner, count: usize) {
    let size = learner.config().state_size;
    for i in 0..count {
        let state = StateVector::fit(vec![(i % 7) as f64 * 0.1, 0.5, 0.2], size);
        let next = StateVector::fit(vec![((i + 1) % 7) as f64 * 0.1, 0.4, 0.3], size);
        let reward = if i % 3 == 0 { 1.0 } else { -0.2 };
        learner
            .remember(Experience::new(state, i % 10, reward, next, i % 11 == 0))
            .unwrap();
    }
}

/// Full propose/feedback loop over several campaigns
#[test]
fn test_optimization_loop() {
    let manager = CampaignOptimizationManager::new(test_config(1)).unwrap();
    let ids: Vec<CampaignId> = (0..4).map(|i| CampaignId::new(format!("camp-{i}"))).collect();

    let mut learned = 0;
    for round in 0..10 {
        for id in &ids {
            let ctr = 0.01 + round as f64 * 0.001;
            let rec = manager.run_optimization_cycle(id, &create_test_metrics(ctr, 0.05, 100.0));
            assert!(rec.action < 10);
            assert_eq!(rec.state.len(), 20);

            let after = create_test_metrics(ctr * 1.05, 0.05, 102.0);
            let outcome = manager.process_feedback(id, &after).unwrap();
            let report = outcome.report().unwrap();
            assert!((-1.0..=1.0).contains(&report.reward));
            if report.loss.is_some() {
                learned += 1;
            }
        }
    }

    let stats = manager.training_stats();
    assert_eq!(stats.buffer_size, 40);
    // training kicks in once the buffer reaches one batch
    assert_eq!(learned, 40 - 7);
    assert_eq!(stats.training_step, 33);
    assert!(stats.epsilon < 1.0);
    assert_eq!(stats.total_episodes, 0);
}

#[test]
fn test_checkpoint_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("learner.json");

    let mut learner = DqnLearner::new(test_config(9)).unwrap();
    seeded_transitions(&mut learner, 64);
    learner.train_epochs(25);
    learner.record_episode(0.75);
    learner.record_episode(-0.5);
    learner.save_checkpoint(&path).unwrap();

    // different seed, so initial weights differ until the load
    let mut restored = DqnLearner::new(test_config(1234)).unwrap();
    assert_ne!(restored.online(), learner.online());
    restored.load_checkpoint(&path).unwrap();

    assert_eq!(restored.epsilon(), learner.epsilon());
    assert_eq!(restored.training_step(), learner.training_step());
    assert_eq!(restored.episode_rewards(), learner.episode_rewards());
    assert_eq!(restored.online(), learner.online());
    assert_eq!(restored.target(), learner.target());

    let mut rng_a = StdRng::seed_from_u64(77);
    let mut rng_b = StdRng::seed_from_u64(77);
    for i in 0..50 {
        let state = StateVector::fit(vec![i as f64 * 0.02, 0.3, 0.9], 20);
        assert_eq!(
            learner.select_action(&state, true, &mut rng_a),
            restored.select_action(&state, true, &mut rng_b)
        );
    }
}

#[test]
fn test_checkpoint_shape_mismatch_keeps_learner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.json");

    let wide = DqnLearner::new(LearnerConfig::seeded(1)).unwrap();
    wide.save_checkpoint(&path).unwrap();

    let manager = CampaignOptimizationManager::new(test_config(2)).unwrap();
    let before = manager.training_stats();
    let err = manager.load_checkpoint(&path).unwrap_err();
    assert!(matches!(err, AdoptError::CheckpointShape(_)));
    assert_eq!(manager.training_stats(), before);
}

#[test]
fn test_checkpoint_io_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CampaignOptimizationManager::new(test_config(2)).unwrap();

    let err = manager
        .load_checkpoint(&dir.path().join("missing.json"))
        .unwrap_err();
    assert!(matches!(err, AdoptError::Checkpoint { .. }));

    // a directory cannot be overwritten by a file
    let err = manager.save_checkpoint(dir.path()).unwrap_err();
    assert!(matches!(err, AdoptError::Checkpoint { .. }));

    // the learner is still usable
    let rec = manager.run_optimization_cycle(
        &CampaignId::from("after-error"),
        &create_test_metrics(0.02, 0.05, 10.0),
    );
    assert!(rec.action < 10);
}

#[test]
fn test_noisy_metrics_never_fail() {
    let manager = CampaignOptimizationManager::new(test_config(5)).unwrap();
    let id = CampaignId::from("noisy");

    let noisy: CampaignMetrics = serde_json::from_str(
        r#"{"impressions": "lots", "clicks": null, "spend": "12.5", "ctr": [1, 2],
            "platform": 42, "sentiment_analysis": {"positive_ratio": "high"}}"#,
    )
    .unwrap();

    let rec = manager.run_optimization_cycle(&id, &noisy);
    assert!(rec.state.as_slice().iter().all(|v| v.is_finite()));

    let outcome = manager.finish_episode(&id, &CampaignMetrics::default()).unwrap();
    let report = outcome.report().unwrap();
    assert!(report.reward.is_finite());
    assert_eq!(manager.training_stats().total_episodes, 1);
}

#[test]
fn test_concurrent_campaigns() {
    let manager = Arc::new(CampaignOptimizationManager::new(test_config(3)).unwrap());

    std::thread::scope(|scope| {
        for t in 0..8 {
            let manager = Arc::clone(&manager);
            scope.spawn(move || {
                let id = CampaignId::new(format!("thread-{t}"));
                for round in 0..10 {
                    let spend = 100.0 + round as f64;
                    manager.run_optimization_cycle(&id, &create_test_metrics(0.02, 0.05, spend));
                    let outcome = manager
                        .process_feedback(&id, &create_test_metrics(0.021, 0.05, spend))
                        .unwrap();
                    assert!(outcome.is_learned());
                }
            });
        }
    });

    let stats = manager.training_stats();
    assert_eq!(stats.buffer_size, 80);
    assert_eq!(stats.training_step, 80 - 7);
    assert_eq!(manager.active_campaigns().len(), 8);
    for id in manager.active_campaigns() {
        let summary = manager.campaign_summary(&id).unwrap();
        assert_eq!(summary.optimization_count, 10);
        assert_eq!(summary.feedback_count, 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_service_concurrent_feedback() {
    let service = OptimizationService::new(test_config(4)).unwrap();

    let mut handles = Vec::new();
    for t in 0..6 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let id = CampaignId::new(format!("async-{t}"));
            for _ in 0..4 {
                service
                    .run_optimization_cycle(id.clone(), create_test_metrics(0.03, 0.04, 80.0))
                    .await
                    .unwrap();
                service
                    .process_feedback(id.clone(), create_test_metrics(0.028, 0.05, 85.0))
                    .await
                    .unwrap();
            }
            service
                .run_optimization_cycle(id.clone(), create_test_metrics(0.028, 0.05, 85.0))
                .await
                .unwrap();
            service
                .finish_episode(id, create_test_metrics(0.03, 0.05, 85.0))
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.report().unwrap().episode_completed);
    }

    let stats = service.training_stats().await.unwrap();
    assert_eq!(stats.buffer_size, 30);
    assert_eq!(stats.total_episodes, 6);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.json");
    service.save_checkpoint(path.clone()).await.unwrap();
    service.load_checkpoint(path).await.unwrap();
    assert_eq!(service.training_stats().await.unwrap(), stats);
}

#[test]
fn test_manual_training_after_feedback() {
    let manager = CampaignOptimizationManager::new(test_config(6)).unwrap();
    assert_eq!(manager.train_epochs(5).epochs_trained, 0);

    let id = CampaignId::from("manual");
    for _ in 0..8 {
        manager.run_optimization_cycle(&id, &create_test_metrics(0.02, 0.05, 100.0));
        manager
            .process_feedback(&id, &create_test_metrics(0.02, 0.05, 100.0))
            .unwrap();
    }
    let step = manager.training_stats().training_step;

    let summary = manager.train_epochs(5);
    assert_eq!(summary.epochs_trained, 5);
    assert_eq!(summary.training_step, step + 5);
}
