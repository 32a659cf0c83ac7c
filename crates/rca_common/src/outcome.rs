//! Per-source outcomes of a fan-out.
//!
//! Every attempted source settles into exactly one `SourceOutcome`; timeouts
//! and provider errors become `Failed` with the reason preserved.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The data sources consulted for a diagnosis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    KubernetesContext,
    LogAnomalies,
    AiAnalysis,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::KubernetesContext => "kubernetes_context",
            SourceKind::LogAnomalies => "log_anomalies",
            SourceKind::AiAnalysis => "ai_analysis",
        }
    }

    /// Only the cluster-state source is mandatory
    pub fn is_required(&self) -> bool {
        matches!(self, SourceKind::KubernetesContext)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a source produced no payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Branch deadline expired before the source answered
    Timeout(#[serde(with = "duration_ms")] Duration),
    /// The guarding circuit breaker rejected the call
    CircuitOpen,
    /// The provider returned an error
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout(deadline) => {
                write!(f, "timed out after {}ms", deadline.as_millis())
            }
            FailureReason::CircuitOpen => f.write_str("circuit breaker open"),
            FailureReason::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Settled result of one source branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome<T> {
    Success(T),
    Failed(FailureReason),
    Skipped,
}

impl<T> SourceOutcome<T> {
    pub fn success(&self) -> Option<&T> {
        match self {
            SourceOutcome::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            SourceOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Success(_))
    }

    pub fn status(&self) -> SourceStatus {
        match self {
            SourceOutcome::Success(_) => SourceStatus::Success,
            SourceOutcome::Failed(_) => SourceStatus::Failed,
            SourceOutcome::Skipped => SourceStatus::Skipped,
        }
    }

    /// Payload-free record kept in the evidence snapshot
    pub fn record(&self, kind: SourceKind) -> SourceRecord {
        SourceRecord {
            kind,
            status: self.status(),
            detail: self.failure().map(|r| r.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Success => f.write_str("success"),
            SourceStatus::Failed => f.write_str("failed"),
            SourceStatus::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub kind: SourceKind,
    pub status: SourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
