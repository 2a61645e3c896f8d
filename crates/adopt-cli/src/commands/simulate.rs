//! Offline simulation against synthetic campaigns
//!
//! Every synthetic campaign secretly responds best to one optimization. The
//! learner only sees the resulting metrics, so a rising hit rate over rounds
//! means it is picking the response up.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use adopt_core::{CampaignId, CampaignMetrics, SentimentBreakdown, TargetAudience};
use adopt_rl::state::PLATFORMS;
use adopt_rl::{CampaignSummary, OptimizationAction, OptimizationService, TrainingStats};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of synthetic campaigns run concurrently
    #[arg(short, long, default_value = "8")]
    pub campaigns: usize,

    /// Optimization rounds per campaign
    #[arg(short, long, default_value = "50")]
    pub rounds: usize,

    /// Seed for the learner and the synthetic campaigns
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not save the learner afterwards
    #[arg(long)]
    pub no_save: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Campaign whose metrics respond to applied optimizations
#[derive(Debug, Clone)]
pub struct SyntheticCampaign {
    pub id: CampaignId,
    /// Optimization this campaign responds to best
    pub preferred: OptimizationAction,
    pub metrics: CampaignMetrics,
    rng: StdRng,
}

impl SyntheticCampaign {
    pub fn new(index: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        let preferred = OptimizationAction::ALL[rng.gen_range(0..OptimizationAction::ALL.len())];

        let impressions = rng.gen_range(5_000.0..50_000.0);
        let ctr = rng.gen_range(0.005..0.04);
        let conversion_rate = rng.gen_range(0.01..0.08);
        let clicks = impressions * ctr;
        let metrics = CampaignMetrics {
            impressions: Some(impressions),
            clicks: Some(clicks),
            conversions: Some(clicks * conversion_rate),
            spend: Some(rng.gen_range(100.0..1_000.0)),
            ctr: Some(ctr),
            conversion_rate: Some(conversion_rate),
            target_audience: Some(TargetAudience {
                interests: vec!["technology".to_string(), "business".to_string()],
                ..Default::default()
            }),
            platform: Some(PLATFORMS[index % PLATFORMS.len()].to_string()),
            sentiment: Some(SentimentBreakdown {
                positive_ratio: Some(0.5),
                negative_ratio: Some(0.2),
                neutral_ratio: Some(0.3),
            }),
            observed_at: Some(Utc::now()),
            ..Default::default()
        };

        Self {
            id: CampaignId::new(format!("sim-{index:03}")),
            preferred,
            metrics,
            rng,
        }
    }

    /// Apply an optimization and advance one hour; returns the new snapshot
    pub fn apply(&mut self, action: OptimizationAction) -> CampaignMetrics {
        let m = &self.metrics;
        let mut ctr = m.ctr();
        let mut conversion_rate = m.conversion_rate();
        let mut spend = m.spend();
        let impressions = m.impressions() * self.rng.gen_range(0.97..1.03);

        if action == self.preferred {
            ctr *= 1.08;
            conversion_rate *= 1.05;
        } else if action != OptimizationAction::NoChange {
            ctr *= 0.98;
            conversion_rate *= 0.99;
        }
        match action {
            OptimizationAction::BudgetIncrease => spend *= 1.1,
            OptimizationAction::BudgetDecrease => spend *= 0.9,
            OptimizationAction::BidIncrease => spend *= 1.05,
            OptimizationAction::BidDecrease => spend *= 0.95,
            _ => {}
        }
        ctr = (ctr * self.rng.gen_range(0.99..1.01)).min(1.0);
        conversion_rate = conversion_rate.min(1.0);

        let clicks = impressions * ctr;
        let observed_at = m.observed_at.unwrap_or_else(Utc::now) + Duration::hours(1);
        self.metrics = CampaignMetrics {
            impressions: Some(impressions),
            clicks: Some(clicks),
            conversions: Some(clicks * conversion_rate),
            spend: Some(spend),
            ctr: Some(ctr),
            conversion_rate: Some(conversion_rate),
            observed_at: Some(observed_at),
            ..self.metrics.clone()
        };
        self.metrics.clone()
    }
}

#[derive(Debug, Serialize)]
struct CampaignRun {
    preferred: OptimizationAction,
    /// Share of rounds in the second half that picked the preferred action
    late_hit_rate: f64,
    summary: Option<CampaignSummary>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    campaigns: Vec<CampaignRun>,
    stats: TrainingStats,
}

pub async fn run(args: SimulateArgs, mut config: Config) -> Result<()> {
    if let Some(seed) = args.seed {
        config.learner.seed = Some(seed);
    }
    let seed = config.learner.seed.unwrap_or_else(rand::random);

    let manager = Arc::new(super::open_manager(&config)?);
    let service = OptimizationService::from_manager(Arc::clone(&manager));

    info!(
        "Simulating {} campaigns for {} rounds",
        args.campaigns, args.rounds
    );

    let mut handles = Vec::with_capacity(args.campaigns);
    for index in 0..args.campaigns {
        let service = service.clone();
        let rounds = args.rounds;
        let campaign = SyntheticCampaign::new(index, seed);
        handles.push(tokio::spawn(simulate_campaign(service, campaign, rounds)));
    }

    let mut campaigns = Vec::with_capacity(handles.len());
    for handle in handles {
        campaigns.push(handle.await.context("Simulation task panicked")??);
    }

    let report = SimulationReport {
        campaigns,
        stats: service.training_stats().await?,
    };
    print_report(&report, args.json)?;

    let path = config.checkpoint.path.clone();
    super::autosave(&config, args.no_save, || manager.save_checkpoint(&path))
}

async fn simulate_campaign(
    service: OptimizationService,
    mut campaign: SyntheticCampaign,
    rounds: usize,
) -> Result<CampaignRun> {
    let id = campaign.id.clone();
    let mut late_hits = 0usize;
    let late_start = rounds / 2;

    for round in 0..rounds {
        let rec = service
            .run_optimization_cycle(id.clone(), campaign.metrics.clone())
            .await?;
        let action = rec.optimization.kind;
        if round >= late_start && action == campaign.preferred {
            late_hits += 1;
        }

        let observed = campaign.apply(action);
        if round + 1 == rounds {
            service.finish_episode(id.clone(), observed).await?;
        } else {
            service.process_feedback(id.clone(), observed).await?;
        }
    }

    let late_rounds = rounds - late_start;
    Ok(CampaignRun {
        preferred: campaign.preferred,
        late_hit_rate: if late_rounds > 0 {
            late_hits as f64 / late_rounds as f64
        } else {
            0.0
        },
        summary: service.campaign_summary(id).await?,
    })
}

fn print_report(report: &SimulationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Simulation Results");
    println!("==================\n");
    println!(
        "{:<10} {:<18} {:>10} {:>12} {:>10}",
        "CAMPAIGN", "PREFERRED", "FEEDBACK", "TOTAL REW", "LATE HIT"
    );
    println!("{}", "-".repeat(64));
    for run in &report.campaigns {
        let Some(summary) = &run.summary else {
            continue;
        };
        println!(
            "{:<10} {:<18} {:>10} {:>12.4} {:>9.0}%",
            summary.campaign_id.as_str(),
            run.preferred.to_string(),
            summary.feedback_count,
            summary.total_reward,
            run.late_hit_rate * 100.0
        );
    }

    let stats = &report.stats;
    println!();
    println!("Training step:   {}", stats.training_step);
    println!("Epsilon:         {:.4}", stats.epsilon);
    println!("Buffer size:     {}", stats.buffer_size);
    println!("Episodes:        {}", stats.total_episodes);
    println!("Average reward:  {:.4}", stats.average_reward);
    Ok(())
}
