//! Source fetchers and the settle primitive used by the fan-out.

use crate::providers::{AiAnalysisProvider, KubernetesContextProvider, LogAnomalyProvider};
use crate::resilience::ResilientCaller;
use rca_common::{
    AiAnalysis, AnalysisTarget, FailureReason, KubernetesContext, LogAnomalies, SourceKind,
    SourceOutcome,
};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Race one branch against its deadline and settle it into an outcome
///
/// A missed deadline drops `fetch`, which cancels any request it still owns
/// locally; the remote side may already have executed it.
pub async fn settle<T, Fut>(kind: SourceKind, deadline: Duration, fetch: Fut) -> SourceOutcome<T>
where
    Fut: Future<Output = Result<T, FailureReason>>,
{
    let started = Instant::now();
    let outcome = match tokio::time::timeout(deadline, fetch).await {
        Ok(Ok(payload)) => SourceOutcome::Success(payload),
        Ok(Err(reason)) => SourceOutcome::Failed(reason),
        Err(_) => SourceOutcome::Failed(FailureReason::Timeout(deadline)),
    };

    let elapsed_ms = started.elapsed().as_millis();
    match outcome.failure() {
        None => debug!("[{}] settled in {}ms", kind, elapsed_ms),
        Some(reason) => warn!("[{}] failed after {}ms: {}", kind, elapsed_ms, reason),
    }
    outcome
}

/// One fan-out branch running on its own task
///
/// A panicking provider settles as `Failed` instead of unwinding the whole
/// diagnosis. Dropping the branch aborts its task.
pub struct Branch<T> {
    kind: SourceKind,
    handle: JoinHandle<SourceOutcome<T>>,
}

impl<T: Send + 'static> Branch<T> {
    pub fn spawn<F>(kind: SourceKind, settled: F) -> Self
    where
        F: Future<Output = SourceOutcome<T>> + Send + 'static,
    {
        Self {
            kind,
            handle: tokio::spawn(settled),
        }
    }

    pub async fn join(mut self) -> SourceOutcome<T> {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[{}] branch task failed: {}", self.kind, e);
                SourceOutcome::Failed(FailureReason::Error(format!("branch task failed: {}", e)))
            }
        }
    }
}

impl<T> Drop for Branch<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Join a branch that may not have been launched
pub async fn join_optional<T: Send + 'static>(branch: Option<Branch<T>>) -> SourceOutcome<T> {
    match branch {
        Some(branch) => branch.join().await,
        None => SourceOutcome::Skipped,
    }
}

fn provider_error(e: anyhow::Error) -> FailureReason {
    FailureReason::Error(format!("{:#}", e))
}

/// Required cluster-state fetch
pub async fn fetch_kubernetes(
    provider: &dyn KubernetesContextProvider,
    target: &AnalysisTarget,
) -> Result<KubernetesContext, FailureReason> {
    provider
        .fetch_context(&target.namespace, &target.cluster, target.time_range)
        .await
        .map_err(provider_error)
}

/// Optional log-anomaly fetch
pub async fn fetch_logs(
    provider: &dyn LogAnomalyProvider,
    target: &AnalysisTarget,
    extra_patterns: &[String],
) -> Result<LogAnomalies, FailureReason> {
    provider
        .detect_anomalies(&target.namespace, target.time_range, extra_patterns)
        .await
        .map_err(provider_error)
}

/// Optional AI analysis, through the shared guards
pub async fn fetch_ai(
    caller: &ResilientCaller,
    provider: &dyn AiAnalysisProvider,
    target: &AnalysisTarget,
) -> Result<AiAnalysis, FailureReason> {
    caller
        .call(|| provider.analyze(target))
        .await
        .map_err(FailureReason::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_settle_timeout_becomes_failed() {
        let outcome: SourceOutcome<u32> = settle(
            SourceKind::LogAnomalies,
            Duration::from_secs(15),
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            },
        )
        .await;
        assert_eq!(
            outcome,
            SourceOutcome::Failed(FailureReason::Timeout(Duration::from_secs(15)))
        );
    }

    #[tokio::test]
    async fn test_settle_keeps_error_detail() {
        let outcome: SourceOutcome<u32> = settle(SourceKind::AiAnalysis, Duration::from_secs(1), async {
            Err(FailureReason::CircuitOpen)
        })
        .await;
        assert_eq!(outcome, SourceOutcome::Failed(FailureReason::CircuitOpen));
    }

    #[tokio::test]
    async fn test_panicking_branch_settles_as_failed() {
        let branch = Branch::spawn(SourceKind::AiAnalysis, async {
            let payload: Option<u32> = None;
            SourceOutcome::Success(payload.expect("provider bug"))
        });
        match branch.join().await {
            SourceOutcome::Failed(FailureReason::Error(detail)) => {
                assert!(detail.starts_with("branch task failed"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_branch_aborts_its_task() {
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = finished.clone();
        let branch: Branch<()> = Branch::spawn(SourceKind::LogAnomalies, async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            SourceOutcome::Success(())
        });
        drop(branch);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unlaunched_branch_is_skipped() {
        assert_eq!(join_optional::<u32>(None).await, SourceOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_settle_success() {
        let outcome = settle(SourceKind::KubernetesContext, Duration::from_secs(1), async {
            Ok::<_, FailureReason>("ctx")
        })
        .await;
        assert_eq!(outcome, SourceOutcome::Success("ctx"));
    }
}
