//! Campaign metrics snapshot consumed by the optimization engine
//!
//! The metrics source is an external collaborator and its payloads are noisy:
//! counters arrive as strings, go missing, or carry NaN. Every numeric field
//! is therefore optional and deserialized leniently, and the accessors apply
//! the documented defaults. Nothing in this module returns an error for bad
//! data.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version of [`CampaignMetrics`]
pub const METRICS_SCHEMA_VERSION: u32 = 1;

/// Default share of positive sentiment when no breakdown is known
pub const DEFAULT_POSITIVE_RATIO: f64 = 0.5;
/// Default share of negative sentiment when no breakdown is known
pub const DEFAULT_NEGATIVE_RATIO: f64 = 0.3;
/// Default share of neutral sentiment when no breakdown is known
pub const DEFAULT_NEUTRAL_RATIO: f64 = 0.2;

/// Point-in-time performance snapshot of a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignMetrics {
    #[serde(deserialize_with = "lenient::version")]
    pub schema_version: u32,

    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub impressions: Option<f64>,

    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub clicks: Option<f64>,

    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub conversions: Option<f64>,

    /// Total spend in account currency
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,

    /// Click-through rate as a fraction (0.02 == 2%)
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub ctr: Option<f64>,

    /// Conversions per click as a fraction
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,

    #[serde(deserialize_with = "lenient::audience", skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<TargetAudience>,

    #[serde(deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(
        alias = "sentiment_analysis",
        deserialize_with = "lenient::sentiment",
        skip_serializing_if = "Option::is_none"
    )]
    pub sentiment: Option<SentimentBreakdown>,

    /// When the snapshot was taken; drives the time-of-day features
    #[serde(deserialize_with = "lenient::timestamp", skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl Default for CampaignMetrics {
    fn default() -> Self {
        Self {
            schema_version: METRICS_SCHEMA_VERSION,
            impressions: None,
            clicks: None,
            conversions: None,
            spend: None,
            ctr: None,
            conversion_rate: None,
            target_audience: None,
            platform: None,
            sentiment: None,
            observed_at: None,
        }
    }
}

impl CampaignMetrics {
    pub fn impressions(&self) -> f64 {
        finite_or_zero(self.impressions)
    }

    pub fn clicks(&self) -> f64 {
        finite_or_zero(self.clicks)
    }

    pub fn conversions(&self) -> f64 {
        finite_or_zero(self.conversions)
    }

    pub fn spend(&self) -> f64 {
        finite_or_zero(self.spend)
    }

    /// Reported CTR, falling back to clicks / impressions
    pub fn ctr(&self) -> f64 {
        match finite(self.ctr) {
            Some(ctr) => ctr,
            None => ratio(self.clicks(), self.impressions()),
        }
    }

    /// Reported conversion rate, falling back to conversions / clicks
    pub fn conversion_rate(&self) -> f64 {
        match finite(self.conversion_rate) {
            Some(rate) => rate,
            None => ratio(self.conversions(), self.clicks()),
        }
    }

    /// Lowercased platform name, empty when unknown
    pub fn platform(&self) -> String {
        self.platform
            .as_deref()
            .map(|p| p.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn positive_ratio(&self) -> f64 {
        self.sentiment
            .as_ref()
            .and_then(|s| finite(s.positive_ratio))
            .unwrap_or(DEFAULT_POSITIVE_RATIO)
    }

    pub fn negative_ratio(&self) -> f64 {
        self.sentiment
            .as_ref()
            .and_then(|s| finite(s.negative_ratio))
            .unwrap_or(DEFAULT_NEGATIVE_RATIO)
    }

    pub fn neutral_ratio(&self) -> f64 {
        self.sentiment
            .as_ref()
            .and_then(|s| finite(s.neutral_ratio))
            .unwrap_or(DEFAULT_NEUTRAL_RATIO)
    }

    /// Hour of day scaled into [0, 1); 0 when the snapshot is unstamped
    pub fn hour_fraction(&self) -> f64 {
        self.observed_at
            .map(|t| f64::from(t.hour()) / 24.0)
            .unwrap_or(0.0)
    }

    /// Day of week (Monday = 0) scaled into [0, 1); 0 when unstamped
    pub fn weekday_fraction(&self) -> f64 {
        self.observed_at
            .map(|t| f64::from(t.weekday().num_days_from_monday()) / 7.0)
            .unwrap_or(0.0)
    }

    /// Stamp the snapshot if the source did not
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at.get_or_insert(at);
        self
    }
}

/// Targeting descriptor of a campaign
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetAudience {
    #[serde(deserialize_with = "lenient::strings")]
    pub interests: Vec<String>,

    /// Remaining targeting keys (locations, age ranges, ...) kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TargetAudience {
    pub fn interest_count(&self) -> usize {
        self.interests.len()
    }

    /// Whether any interest or other targeting value mentions `category`
    pub fn mentions(&self, category: &str) -> bool {
        let needle = category.to_lowercase();
        self.interests
            .iter()
            .any(|interest| interest.to_lowercase().contains(&needle))
            || self.extra.iter().any(|(key, value)| {
                key.to_lowercase().contains(&needle) || value_mentions(value, &needle)
            })
    }
}

/// Share of positive/negative/neutral audience reactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentBreakdown {
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub positive_ratio: Option<f64>,

    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub negative_ratio: Option<f64>,

    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub neutral_ratio: Option<f64>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    finite(value).unwrap_or(0.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn value_mentions(value: &serde_json::Value, needle: &str) -> bool {
    match value {
        serde_json::Value::String(s) => s.to_lowercase().contains(needle),
        serde_json::Value::Array(items) => items.iter().any(|v| value_mentions(v, needle)),
        serde_json::Value::Object(map) => map
            .iter()
            .any(|(k, v)| k.to_lowercase().contains(needle) || value_mentions(v, needle)),
        _ => false,
    }
}

/// Deserializers that turn malformed input into `None` instead of an error
mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{SentimentBreakdown, TargetAudience, METRICS_SCHEMA_VERSION};

    fn raw<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Value>::deserialize(deserializer)
    }

    fn to_number(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        n.filter(|v| v.is_finite())
    }

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(raw(deserializer)?.as_ref().and_then(to_number))
    }

    /// Schema version; anything but a non-negative integer means the current one
    pub fn version<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = raw(deserializer)?.as_ref().and_then(to_number).and_then(|v| {
            (v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX)).then_some(v as u32)
        });
        Ok(version.unwrap_or(METRICS_SCHEMA_VERSION))
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match raw(deserializer)? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match raw(deserializer)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn audience<'de, D>(deserializer: D) -> Result<Option<TargetAudience>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match raw(deserializer)? {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
            _ => None,
        })
    }

    pub fn sentiment<'de, D>(deserializer: D) -> Result<Option<SentimentBreakdown>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match raw(deserializer)? {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
            _ => None,
        })
    }

    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match raw(deserializer)? {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            _ => None,
        })
    }
}
