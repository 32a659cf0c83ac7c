//! RCA Common - Shared types for the diagnosis orchestrator
//!
//! Request, evidence and result types exchanged between the orchestrator,
//! its data-source collaborators and the archival/audit sinks.

pub mod audit;
pub mod config;
pub mod error;
pub mod evidence;
pub mod outcome;
pub mod request;
pub mod result;

pub use audit::AuditRecord;
pub use config::{
    ActionRuleConfig, ArchiveConfig, AuditConfig, BreakerConfig, DeadlineConfig, EvidenceLimits,
    LogConfig, RateLimitConfig, RcaConfig,
};
pub use error::{CallError, DiagnosisError};
pub use evidence::{
    AiAnalysis, AiProblem, DeploymentSummary, EventSeverity, K8sEvent, KubernetesContext,
    LogAnomalies, LogEntry, PodSummary,
};
pub use outcome::{FailureReason, SourceKind, SourceOutcome, SourceRecord, SourceStatus};
pub use request::{AnalysisRequest, AnalysisTarget, TimeRange};
pub use result::{EvidenceFactor, EvidenceSnapshot, RcaResult};

/// Crate version, stamped into every audit record
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
