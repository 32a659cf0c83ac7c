//! Diagnosis Orchestrator
//!
//! ## Flow
//!
//! ```text
//! request → resolve entity → ┬ K8sContext   (10s, required) ┬ → settle all → aggregate
//!                            ├ LogAnomalies (15s, optional) ┤
//!                            └ AIAnalysis   (20s, optional) ┘
//! ```
//!
//! ## Invariants
//!
//! 1. Entity resolution failure aborts before any source is queried
//! 2. Every launched branch settles into exactly one `SourceOutcome`
//! 3. The join waits for all three branches, never fail-fast
//! 4. A failed required source aborts the run; optional failures only warn
//! 5. The AI provider is reached only through the shared `ResilientCaller`
//! 6. Each branch runs on its own task, so a panicking provider settles as
//!    `Failed`; dropping the run aborts the branch tasks

use crate::aggregator::{ActionRules, Aggregator};
use crate::providers::{
    AiAnalysisProvider, EntityResolver, KubernetesContextProvider, LogAnomalyProvider,
};
use crate::resilience::ResilientCaller;
use crate::sources::{fetch_ai, fetch_kubernetes, fetch_logs, join_optional, settle, Branch};
use rca_common::{
    AiAnalysis, AnalysisRequest, AnalysisTarget, DeadlineConfig, DiagnosisError, FailureReason,
    KubernetesContext, LogAnomalies, RcaConfig, RcaResult, SourceKind, SourceOutcome,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// External data sources of one deployment
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn EntityResolver>,
    pub kubernetes: Arc<dyn KubernetesContextProvider>,
    pub logs: Arc<dyn LogAnomalyProvider>,
    /// `None` when no AI provider is configured; the AI branch is then skipped
    pub ai: Option<Arc<dyn AiAnalysisProvider>>,
}

/// Settled outcomes of one fan-out
#[derive(Debug, Clone)]
pub struct Evidence {
    pub kubernetes: SourceOutcome<KubernetesContext>,
    pub logs: SourceOutcome<LogAnomalies>,
    pub ai: SourceOutcome<AiAnalysis>,
}

impl Evidence {
    /// First mandatory source that did not deliver
    pub fn required_failure(&self) -> Option<(SourceKind, &FailureReason)> {
        [
            (SourceKind::KubernetesContext, self.kubernetes.failure()),
            (SourceKind::LogAnomalies, self.logs.failure()),
            (SourceKind::AiAnalysis, self.ai.failure()),
        ]
        .into_iter()
        .filter(|(kind, _)| kind.is_required())
        .find_map(|(kind, failure)| failure.map(|reason| (kind, reason)))
    }
}

pub struct Orchestrator {
    collaborators: Collaborators,
    /// Shared with every other orchestrator targeting the same AI provider
    ai_caller: Arc<ResilientCaller>,
    deadlines: DeadlineConfig,
    extra_patterns: Arc<[String]>,
    aggregator: Aggregator,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        ai_caller: Arc<ResilientCaller>,
        config: &RcaConfig,
    ) -> Self {
        Self {
            collaborators,
            ai_caller,
            deadlines: config.deadlines.clone(),
            extra_patterns: config.logs.extra_patterns.clone().into(),
            aggregator: Aggregator::new(
                ActionRules::from_config(&config.actions),
                config.evidence.clone(),
            ),
        }
    }

    /// Run one diagnosis
    pub async fn run(&self, request: &AnalysisRequest) -> Result<RcaResult, DiagnosisError> {
        let started = Instant::now();
        info!(
            "[RCA] Starting diagnosis of {} over {}",
            request.entity_ref, request.time_range
        );

        let resolved = self
            .collaborators
            .resolver
            .resolve(&request.entity_ref)
            .await
            .map_err(|e| {
                error!("[RCA] Entity resolution failed for {}: {:#}", request.entity_ref, e);
                DiagnosisError::EntityResolution {
                    entity_ref: request.entity_ref.clone(),
                    reason: format!("{:#}", e),
                }
            })?;

        let target = AnalysisTarget {
            entity_ref: request.entity_ref.clone(),
            namespace: resolved.namespace,
            cluster: resolved.cluster,
            time_range: request.time_range,
        };
        debug!(
            "[RCA] Resolved {} to {}/{}",
            target.entity_ref, target.cluster, target.namespace
        );
        if request.include_metrics {
            debug!("[RCA] Metrics requested but no metrics source is configured");
        }

        let evidence = self.gather(request, &target).await;

        if let Some((stage, reason)) = evidence.required_failure() {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            error!(
                "[RCA] Required source {} failed for {} after {}ms: {}",
                stage, target.entity_ref, elapsed_ms, reason
            );
            return Err(DiagnosisError::RequiredSource {
                stage,
                entity_ref: target.entity_ref,
                elapsed_ms,
                reason: reason.clone(),
            });
        }

        let result = self
            .aggregator
            .score(&evidence.kubernetes, &evidence.logs, &evidence.ai);
        info!(
            "[RCA] Diagnosis of {} finished in {}ms: confidence {}, {} factors, {} actions",
            target.entity_ref,
            started.elapsed().as_millis(),
            result.confidence_score,
            result.factors.len(),
            result.actions.len()
        );
        Ok(result)
    }

    /// Fan out the three sources and wait for all of them to settle
    pub async fn gather(&self, request: &AnalysisRequest, target: &AnalysisTarget) -> Evidence {
        let kubernetes = {
            let provider = Arc::clone(&self.collaborators.kubernetes);
            let target = target.clone();
            let deadline = self.deadlines.kubernetes();
            Branch::spawn(SourceKind::KubernetesContext, async move {
                let fetch = fetch_kubernetes(provider.as_ref(), &target);
                settle(SourceKind::KubernetesContext, deadline, fetch).await
            })
        };

        let logs = request.include_logs.then(|| {
            let provider = Arc::clone(&self.collaborators.logs);
            let target = target.clone();
            let deadline = self.deadlines.logs();
            let extra_patterns = Arc::clone(&self.extra_patterns);
            Branch::spawn(SourceKind::LogAnomalies, async move {
                let fetch = fetch_logs(provider.as_ref(), &target, &extra_patterns);
                settle(SourceKind::LogAnomalies, deadline, fetch).await
            })
        });

        let ai = match (&self.collaborators.ai, request.include_ai) {
            (Some(provider), true) => {
                let provider = Arc::clone(provider);
                let caller = Arc::clone(&self.ai_caller);
                let target = target.clone();
                let deadline = self.deadlines.ai();
                Some(Branch::spawn(SourceKind::AiAnalysis, async move {
                    let fetch = fetch_ai(&caller, provider.as_ref(), &target);
                    settle(SourceKind::AiAnalysis, deadline, fetch).await
                }))
            }
            _ => None,
        };

        let (kubernetes, logs, ai) =
            tokio::join!(kubernetes.join(), join_optional(logs), join_optional(ai));
        Evidence {
            kubernetes,
            logs,
            ai,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{FakeEntityResolver, FakeSource};
    use rca_common::TimeRange;

    #[tokio::test]
    async fn test_ai_skipped_without_provider() {
        let config = RcaConfig::default();
        let collaborators = Collaborators {
            resolver: Arc::new(FakeEntityResolver::new().entity("component:a", "a", "dev")),
            kubernetes: Arc::new(FakeSource::ok(KubernetesContext::default())),
            logs: Arc::new(FakeSource::ok(LogAnomalies::default())),
            ai: None,
        };
        let orchestrator = Orchestrator::new(
            collaborators,
            Arc::new(ResilientCaller::from_config(&config)),
            &config,
        );

        let request = AnalysisRequest::new("component:a", TimeRange::FiveMinutes);
        let target = AnalysisTarget {
            entity_ref: "component:a".to_string(),
            namespace: "a".to_string(),
            cluster: "dev".to_string(),
            time_range: TimeRange::FiveMinutes,
        };
        let evidence = orchestrator.gather(&request, &target).await;

        assert!(evidence.kubernetes.is_success());
        assert!(evidence.logs.is_success());
        assert_eq!(evidence.ai, SourceOutcome::Skipped);
    }

    #[test]
    fn test_only_required_sources_abort() {
        let timeout = FailureReason::Timeout(std::time::Duration::from_secs(15));
        let evidence = Evidence {
            kubernetes: SourceOutcome::Success(KubernetesContext::default()),
            logs: SourceOutcome::Failed(timeout.clone()),
            ai: SourceOutcome::Failed(FailureReason::CircuitOpen),
        };
        assert_eq!(evidence.required_failure(), None);

        let evidence = Evidence {
            kubernetes: SourceOutcome::Failed(timeout.clone()),
            ..evidence
        };
        assert_eq!(
            evidence.required_failure(),
            Some((SourceKind::KubernetesContext, &timeout))
        );
    }
}
