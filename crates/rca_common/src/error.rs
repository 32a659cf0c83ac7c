//! Error types for the diagnosis orchestrator.

use crate::outcome::{FailureReason, SourceKind};
use std::time::Duration;
use thiserror::Error;

/// Fatal errors: the caller gets one of these instead of a result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosisError {
    #[error("Entity resolution failed for {entity_ref}: {reason}")]
    EntityResolution { entity_ref: String, reason: String },

    #[error("Required source {stage} failed for {entity_ref} after {elapsed_ms}ms: {reason}")]
    RequiredSource {
        stage: SourceKind,
        entity_ref: String,
        elapsed_ms: u64,
        reason: FailureReason,
    },

    #[error("Report archival failed for {entity_ref}: {reason}")]
    Archive { entity_ref: String, reason: String },
}

impl DiagnosisError {
    /// Stable code for audit records
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosisError::EntityResolution { .. } => "entity_resolution",
            DiagnosisError::RequiredSource { .. } => "required_source",
            DiagnosisError::Archive { .. } => "archive",
        }
    }

    /// Pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            DiagnosisError::EntityResolution { .. } => "entity_resolution",
            DiagnosisError::RequiredSource { stage, .. } => stage.as_str(),
            DiagnosisError::Archive { .. } => "archive",
        }
    }
}

/// Errors from a guarded provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Circuit breaker open")]
    CircuitOpen,

    #[error("Provider call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<CallError> for FailureReason {
    fn from(err: CallError) -> Self {
        match err {
            CallError::CircuitOpen => FailureReason::CircuitOpen,
            CallError::Timeout(deadline) => FailureReason::Timeout(deadline),
            CallError::Provider(msg) => FailureReason::Error(msg),
        }
    }
}
