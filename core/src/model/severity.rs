use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

const CRITICAL_AT: f64 = 0.85;
const HIGH_AT: f64 = 0.65;
const MEDIUM_AT: f64 = 0.45;

/// Ordinal severity bucket, ordered by ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
    Critical,
}

/// Maps a confidence score onto a tier. NaN counts as 0.
pub fn classify(confidence: f64) -> SeverityTier {
    let score = if confidence.is_nan() { 0.0 } else { confidence };
    if score >= CRITICAL_AT {
        SeverityTier::Critical
    } else if score >= HIGH_AT {
        SeverityTier::High
    } else if score >= MEDIUM_AT {
        SeverityTier::Medium
    } else {
        SeverityTier::Low
    }
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTier::Low => "low",
            SeverityTier::Medium => "medium",
            SeverityTier::High => "high",
            SeverityTier::Critical => "critical",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SeverityTier::Low),
            "medium" => Ok(SeverityTier::Medium),
            "high" => Ok(SeverityTier::High),
            "critical" => Ok(SeverityTier::Critical),
            other => Err(format!("unknown severity {other:?}")),
        }
    }
}

/// Unknown or empty tier strings are treated as absent.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<SeverityTier>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}
