//! Integration tests for the campaign metrics model
//! Tests lenient parsing of metrics payloads as delivered by ad platforms

use adopt_core::{CampaignId, CampaignMetrics, AdoptError};

#[test]
fn test_full_platform_payload() {
    let json = r#"{
        "impressions": 15000,
        "clicks": 300,
        "conversions": 12,
        "spend": 245.5,
        "ctr": 0.02,
        "conversion_rate": 0.04,
        "target_audience": {"interests": ["technology", "business"], "locations": ["US"]},
        "platform": "LinkedIn",
        "sentiment_analysis": {"positive_ratio": 0.7, "negative_ratio": 0.1, "neutral_ratio": 0.2},
        "observed_at": "2024-03-04T18:00:00Z"
    }"#;

    let metrics: CampaignMetrics = serde_json::from_str(json).unwrap();

    assert_eq!(metrics.impressions(), 15000.0);
    assert_eq!(metrics.spend(), 245.5);
    assert_eq!(metrics.platform(), "linkedin");
    assert_eq!(metrics.positive_ratio(), 0.7);
    assert_eq!(metrics.hour_fraction(), 0.75);
    assert_eq!(metrics.weekday_fraction(), 0.0);

    let audience = metrics.target_audience.as_ref().unwrap();
    assert_eq!(audience.interest_count(), 2);
    assert!(audience.extra.contains_key("locations"));
}

#[test]
fn test_empty_payload() {
    let metrics: CampaignMetrics = serde_json::from_str("{}").unwrap();
    assert_eq!(metrics, CampaignMetrics::default());
}

#[test]
fn test_partial_sentiment_keeps_defaults_for_missing_ratios() {
    let metrics: CampaignMetrics =
        serde_json::from_str(r#"{"sentiment": {"positive_ratio": "0.9"}}"#).unwrap();
    assert_eq!(metrics.positive_ratio(), 0.9);
    assert_eq!(metrics.negative_ratio(), 0.3);
    assert_eq!(metrics.neutral_ratio(), 0.2);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let metrics: CampaignMetrics =
        serde_json::from_str(r#"{"clicks": 5, "frequency_cap": 3}"#).unwrap();
    assert_eq!(metrics.clicks(), 5.0);
}

#[test]
fn test_error_display() {
    let err = AdoptError::InvalidAction {
        index: 12,
        action_count: 10,
    };
    assert_eq!(
        err.to_string(),
        "Invalid action index 12 (action space has 10 actions)"
    );

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err = AdoptError::checkpoint("/tmp/dqn.json", io);
    assert!(err.to_string().contains("/tmp/dqn.json"));
}

#[test]
fn test_campaign_id_ordering() {
    let mut ids = vec![CampaignId::from("b"), CampaignId::from("a")];
    ids.sort();
    assert_eq!(ids[0].as_str(), "a");
}
