//! Audit record emitted once per diagnosis attempt.

use crate::outcome::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ACTION_DIAGNOSE: &str = "rca.diagnose";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub entity_ref: String,
    pub duration_ms: u64,
    /// Absent when the run failed before scoring
    pub confidence_score: Option<u8>,
    pub data_sources_used: Vec<SourceKind>,
    pub success: bool,
    /// Stable error code for failed runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `rca_common::VERSION` of the writer; empty for records written before it was stamped
    #[serde(default)]
    pub version: String,
}
