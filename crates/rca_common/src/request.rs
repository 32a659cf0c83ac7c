//! Analysis request types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lookback window for a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        TimeRange::FiveMinutes,
        TimeRange::FifteenMinutes,
        TimeRange::OneHour,
        TimeRange::SixHours,
        TimeRange::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::FiveMinutes => "5m",
            TimeRange::FifteenMinutes => "15m",
            TimeRange::OneHour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::OneDay => "24h",
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::OneHour
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .iter()
            .copied()
            .find(|range| range.as_str() == s.trim())
            .ok_or_else(|| format!("invalid time range '{}' (expected 5m, 15m, 1h, 6h or 24h)", s))
    }
}

/// A single diagnosis invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Opaque catalog reference of the component to diagnose
    pub entity_ref: String,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default = "default_true")]
    pub include_logs: bool,
    #[serde(default = "default_true")]
    pub include_ai: bool,
    /// Accepted for interface compatibility; there is no metrics source
    #[serde(default)]
    pub include_metrics: bool,
}

fn default_true() -> bool {
    true
}

impl AnalysisRequest {
    pub fn new(entity_ref: impl Into<String>, time_range: TimeRange) -> Self {
        Self {
            entity_ref: entity_ref.into(),
            time_range,
            include_logs: true,
            include_ai: true,
            include_metrics: false,
        }
    }

    pub fn without_logs(mut self) -> Self {
        self.include_logs = false;
        self
    }

    pub fn without_ai(mut self) -> Self {
        self.include_ai = false;
        self
    }
}

/// Request after entity resolution: where the component actually runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTarget {
    pub entity_ref: String,
    pub namespace: String,
    pub cluster: String,
    pub time_range: TimeRange,
}
