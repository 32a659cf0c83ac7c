//! Payloads returned by the diagnosis data sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Kubernetes context
// ============================================================================

/// Event severity as reported by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSeverity {
    Normal,
    Warning,
    Failed,
}

impl EventSeverity {
    /// Warning and Failed events count as critical evidence
    pub fn is_critical(&self) -> bool {
        matches!(self, EventSeverity::Warning | EventSeverity::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sEvent {
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub severity: EventSeverity,
    /// e.g. "Pod/checkout-7d9f8-abcde"
    #[serde(default)]
    pub involved_object: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    pub name: String,
    pub phase: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restarts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub desired_replicas: u32,
    pub available_replicas: u32,
}

/// Cluster-state snapshot for the resolved namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesContext {
    #[serde(default)]
    pub events: Vec<K8sEvent>,
    #[serde(default)]
    pub pods: Vec<PodSummary>,
    #[serde(default)]
    pub deployments: Vec<DeploymentSummary>,
}

impl KubernetesContext {
    pub fn critical_events(&self) -> impl Iterator<Item = &K8sEvent> {
        self.events.iter().filter(|e| e.severity.is_critical())
    }
}

// ============================================================================
// Log anomalies
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Anomaly summary over the requested window
///
/// `patterns` are ordered most frequent first and already carry their
/// count, e.g. `"timeout (5x)"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAnomalies {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub warning_count: u32,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub time_range: String,
}

// ============================================================================
// AI analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiProblem {
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub problems: Vec<AiProblem>,
    #[serde(default)]
    pub summary: Option<String>,
}
