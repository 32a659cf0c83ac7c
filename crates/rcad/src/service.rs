//! Diagnosis service: the invocation surface.
//!
//! Runs the orchestrator, archives the rendered report and records one
//! audit entry per attempt, successful or not.

use crate::orchestrator::Orchestrator;
use crate::providers::{AuditSink, GitCommitter};
use crate::report;
use chrono::Utc;
use rca_common::audit::ACTION_DIAGNOSE;
use rca_common::{AnalysisRequest, AuditRecord, DiagnosisError, RcaResult, VERSION};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Completed diagnosis as handed back to the caller
#[derive(Debug, Clone)]
pub struct DiagnosisOutcome {
    pub result: RcaResult,
    /// Rendered report, as archived
    pub report: String,
    pub git_commit_id: String,
}

pub struct DiagnosisService {
    orchestrator: Orchestrator,
    committer: Arc<dyn GitCommitter>,
    audit: Arc<dyn AuditSink>,
}

impl DiagnosisService {
    pub fn new(
        orchestrator: Orchestrator,
        committer: Arc<dyn GitCommitter>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            orchestrator,
            committer,
            audit,
        }
    }

    pub async fn diagnose(
        &self,
        request: &AnalysisRequest,
    ) -> Result<DiagnosisOutcome, DiagnosisError> {
        let started = Instant::now();
        let outcome = self.run(request).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let record = match &outcome {
            Ok(done) => AuditRecord {
                timestamp: Utc::now(),
                action: ACTION_DIAGNOSE.to_string(),
                entity_ref: request.entity_ref.clone(),
                duration_ms,
                confidence_score: Some(done.result.confidence_score),
                data_sources_used: done.result.data_sources_used(),
                success: true,
                error: None,
                version: VERSION.to_string(),
            },
            Err(e) => AuditRecord {
                timestamp: Utc::now(),
                action: ACTION_DIAGNOSE.to_string(),
                entity_ref: request.entity_ref.clone(),
                duration_ms,
                confidence_score: None,
                data_sources_used: vec![],
                success: false,
                error: Some(e.code().to_string()),
                version: VERSION.to_string(),
            },
        };

        // Audit is best-effort; it never changes the diagnosis outcome
        if let Err(e) = self.audit.record(&record).await {
            warn!("Failed to record audit entry for {}: {:#}", request.entity_ref, e);
        }

        outcome
    }

    async fn run(&self, request: &AnalysisRequest) -> Result<DiagnosisOutcome, DiagnosisError> {
        let result = self.orchestrator.run(request).await?;

        for warning in result.warnings() {
            warn!("[RCA] {}: {}", request.entity_ref, warning);
        }

        let report = report::render(&request.entity_ref, &result);
        let filename = report::suggested_filename(&request.entity_ref, result.generated_at);

        let git_commit_id = self
            .committer
            .commit(&report, &filename)
            .await
            .map_err(|e| DiagnosisError::Archive {
                entity_ref: request.entity_ref.clone(),
                reason: format!("{:#}", e),
            })?;
        info!("[RCA] Report for {} archived as {}", request.entity_ref, git_commit_id);

        Ok(DiagnosisOutcome {
            result,
            report,
            git_commit_id,
        })
    }
}
