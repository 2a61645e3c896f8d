//! One-off recommendation for a campaign snapshot

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use adopt_core::{CampaignId, CampaignMetrics};
use adopt_rl::OptimizationService;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// Campaign the snapshot belongs to
    pub campaign_id: String,

    /// JSON metrics snapshot; `-` reads stdin
    #[arg(short, long, default_value = "-")]
    pub metrics: PathBuf,

    /// Pretty-print the recommendation
    #[arg(long)]
    pub pretty: bool,
}

pub async fn run(args: RecommendArgs, config: Config) -> Result<()> {
    let raw = read_input(&args.metrics)?;
    let metrics = parse_metrics(&raw)?;

    let service = OptimizationService::from_manager(Arc::new(super::open_manager(&config)?));
    let recommendation = service
        .run_optimization_cycle(CampaignId::new(args.campaign_id), metrics)
        .await?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&recommendation)?
    } else {
        serde_json::to_string(&recommendation)?
    };
    println!("{output}");
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read metrics from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metrics file {}", path.display()))
    }
}

/// Parse a snapshot; unknown or malformed fields fall back to defaults
pub fn parse_metrics(raw: &str) -> Result<CampaignMetrics> {
    if raw.trim().is_empty() {
        return Ok(CampaignMetrics::default());
    }
    serde_json::from_str(raw).context("Metrics must be a JSON object")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metrics_lenient() {
        let metrics =
            parse_metrics(r#"{"impressions": "1000", "ctr": 0.02, "platform": 7}"#).unwrap();
        assert_eq!(metrics.impressions, Some(1000.0));
        assert_eq!(metrics.ctr, Some(0.02));
        assert!(metrics.platform.is_none());
    }

    #[test]
    fn test_parse_noisy_schema_version() {
        let metrics = parse_metrics(r#"{"schema_version": "v1", "clicks": 40}"#).unwrap();
        assert_eq!(metrics.schema_version, 1);
        assert_eq!(metrics.clicks, Some(40.0));
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_metrics("  \n").unwrap(), CampaignMetrics::default());
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(parse_metrics("impressions=1000").is_err());
    }
}
