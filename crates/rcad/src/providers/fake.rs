//! Fake collaborators for deterministic testing
//!
//! ```rust,ignore
//! let logs = FakeSource::ok(LogAnomalies::default()).with_delay(Duration::from_secs(30));
//! let ai = FakeSource::<AiAnalysis>::err("provider unavailable");
//! assert_eq!(ai.calls(), 0);
//! ```

use super::{
    AiAnalysisProvider, AuditSink, EntityResolver, GitCommitter, KubernetesContextProvider,
    LogAnomalyProvider, ResolvedEntity,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rca_common::{
    AiAnalysis, AnalysisTarget, AuditRecord, KubernetesContext, LogAnomalies, TimeRange,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Pre-configured response for a fake source
#[derive(Debug, Clone)]
pub enum FakeResponse<T> {
    Ok(T),
    Err(String),
}

/// Fake data source usable for any of the three provider traits
pub struct FakeSource<T> {
    /// Served first, in order
    queued: Mutex<VecDeque<FakeResponse<T>>>,
    /// Served once the queue is empty
    fallback: FakeResponse<T>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl<T: Clone> FakeSource<T> {
    pub fn ok(payload: T) -> Self {
        Self::with_fallback(FakeResponse::Ok(payload))
    }

    pub fn err(message: &str) -> Self {
        Self::with_fallback(FakeResponse::Err(message.to_string()))
    }

    fn with_fallback(fallback: FakeResponse<T>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep before answering (drives branch deadlines in tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serve `response` before falling back
    pub fn then(self, response: FakeResponse<T>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(response);
        }
        self
    }

    /// Number of times the source was invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the call counter, readable after the fake is moved
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    async fn respond(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .queued
            .lock()
            .ok()
            .and_then(|mut queued| queued.pop_front())
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            FakeResponse::Ok(payload) => Ok(payload),
            FakeResponse::Err(message) => Err(anyhow!(message)),
        }
    }
}

#[async_trait]
impl KubernetesContextProvider for FakeSource<KubernetesContext> {
    async fn fetch_context(
        &self,
        _namespace: &str,
        _cluster: &str,
        _time_range: TimeRange,
    ) -> Result<KubernetesContext> {
        self.respond().await
    }
}

#[async_trait]
impl LogAnomalyProvider for FakeSource<LogAnomalies> {
    async fn detect_anomalies(
        &self,
        _namespace: &str,
        _time_range: TimeRange,
        _extra_patterns: &[String],
    ) -> Result<LogAnomalies> {
        self.respond().await
    }
}

#[async_trait]
impl AiAnalysisProvider for FakeSource<AiAnalysis> {
    async fn analyze(&self, _target: &AnalysisTarget) -> Result<AiAnalysis> {
        self.respond().await
    }
}

/// Fake catalog: unknown entities fail to resolve
#[derive(Default)]
pub struct FakeEntityResolver {
    entities: HashMap<String, ResolvedEntity>,
    calls: AtomicUsize,
}

impl FakeEntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity_ref: &str, namespace: &str, cluster: &str) -> Self {
        self.entities.insert(
            entity_ref.to_string(),
            ResolvedEntity {
                namespace: namespace.to_string(),
                cluster: cluster.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityResolver for FakeEntityResolver {
    async fn resolve(&self, entity_ref: &str) -> Result<ResolvedEntity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entities
            .get(entity_ref)
            .cloned()
            .ok_or_else(|| anyhow!("entity '{}' not found in catalog", entity_ref))
    }
}

/// Audit sink keeping records in memory
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("audit sink poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Committer keeping archived documents in memory
#[derive(Default)]
pub struct FakeCommitter {
    commits: Mutex<Vec<(String, String)>>,
    fail_with: Option<String>,
}

impl FakeCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            commits: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    /// `(filename, content)` pairs in commit order
    pub fn commits(&self) -> Vec<(String, String)> {
        self.commits.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GitCommitter for FakeCommitter {
    async fn commit(&self, content: &str, suggested_filename: &str) -> Result<String> {
        if let Some(message) = &self.fail_with {
            return Err(anyhow!(message.clone()));
        }
        let mut commits = self
            .commits
            .lock()
            .map_err(|_| anyhow!("committer poisoned"))?;
        commits.push((suggested_filename.to_string(), content.to_string()));
        Ok(format!("fake-{:04}", commits.len()))
    }
}
