//! Diagnosis result types.

use crate::evidence::{K8sEvent, LogEntry, PodSummary};
use crate::outcome::{SourceKind, SourceRecord, SourceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound of the confidence score
pub const MAX_CONFIDENCE: u8 = 100;

/// One triggered piece of evidence and what it contributes to the score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFactor {
    pub description: String,
    /// Weight added once per triggered rule; zero for follow-up lines of the same rule
    pub weight: u8,
    pub source: SourceKind,
}

/// Bounded raw samples retained alongside a diagnosis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    pub critical_events: Vec<K8sEvent>,
    pub pods: Vec<PodSummary>,
    pub log_samples: Vec<LogEntry>,
    pub log_patterns: Vec<String>,
    pub error_count: u32,
    pub warning_count: u32,
    /// Full AI payload, when the AI source succeeded
    pub ai_analysis: Option<serde_json::Value>,
    pub sources: Vec<SourceRecord>,
}

/// Scored, explained diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaResult {
    pub summary: String,
    /// Clamped sum of triggered evidence weights, 0..=100
    pub confidence_score: u8,
    pub factors: Vec<String>,
    pub actions: Vec<String>,
    pub evidence: EvidenceSnapshot,
    pub generated_at: DateTime<Utc>,
}

impl RcaResult {
    /// Sources that contributed a payload
    pub fn data_sources_used(&self) -> Vec<SourceKind> {
        self.evidence
            .sources
            .iter()
            .filter(|s| s.status == SourceStatus::Success)
            .map(|s| s.kind)
            .collect()
    }

    /// Optional sources that failed, as human-readable warnings
    pub fn warnings(&self) -> Vec<String> {
        self.evidence
            .sources
            .iter()
            .filter(|s| s.status == SourceStatus::Failed)
            .map(|s| match &s.detail {
                Some(detail) => format!("{} unavailable: {}", s.kind, detail),
                None => format!("{} unavailable", s.kind),
            })
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.factors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_sources(sources: Vec<SourceRecord>) -> RcaResult {
        RcaResult {
            summary: String::new(),
            confidence_score: 0,
            factors: vec![],
            actions: vec![],
            evidence: EvidenceSnapshot {
                sources,
                ..Default::default()
            },
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sources_used_and_warnings() {
        let result = result_with_sources(vec![
            SourceRecord {
                kind: SourceKind::KubernetesContext,
                status: SourceStatus::Success,
                detail: None,
            },
            SourceRecord {
                kind: SourceKind::LogAnomalies,
                status: SourceStatus::Failed,
                detail: Some("timed out after 15000ms".to_string()),
            },
            SourceRecord {
                kind: SourceKind::AiAnalysis,
                status: SourceStatus::Skipped,
                detail: None,
            },
        ]);

        assert_eq!(result.data_sources_used(), vec![SourceKind::KubernetesContext]);
        assert_eq!(
            result.warnings(),
            vec!["log_anomalies unavailable: timed out after 15000ms".to_string()]
        );
        assert!(result.is_healthy());
    }
}
