//! Collaborator trait abstractions
//!
//! The orchestrator only sees these traits:
//! - Production wiring uses the fixture-backed adapters or real clients
//! - Tests use the fakes with pre-configured responses and call counters

pub mod fake;
pub mod fixture;

use anyhow::Result;
use async_trait::async_trait;
use rca_common::{
    AiAnalysis, AnalysisTarget, AuditRecord, KubernetesContext, LogAnomalies, TimeRange,
};
use serde::{Deserialize, Serialize};

pub use fake::{
    FakeCommitter, FakeEntityResolver, FakeResponse, FakeSource, MemoryAuditSink,
};
pub use fixture::FixtureProviders;

/// Where a catalog entity runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub namespace: String,
    pub cluster: String,
}

#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Resolve a catalog reference; `Err` when the entity is unknown
    async fn resolve(&self, entity_ref: &str) -> Result<ResolvedEntity>;
}

#[async_trait]
pub trait KubernetesContextProvider: Send + Sync {
    async fn fetch_context(
        &self,
        namespace: &str,
        cluster: &str,
        time_range: TimeRange,
    ) -> Result<KubernetesContext>;
}

/// Implementations are expected to absorb their own backend failures and
/// return an empty result instead
#[async_trait]
pub trait LogAnomalyProvider: Send + Sync {
    async fn detect_anomalies(
        &self,
        namespace: &str,
        time_range: TimeRange,
        extra_patterns: &[String],
    ) -> Result<LogAnomalies>;
}

/// Raw AI provider; only ever invoked through `ResilientCaller`
#[async_trait]
pub trait AiAnalysisProvider: Send + Sync {
    async fn analyze(&self, target: &AnalysisTarget) -> Result<AiAnalysis>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

#[async_trait]
pub trait GitCommitter: Send + Sync {
    /// Archive `content`; returns the commit id
    async fn commit(&self, content: &str, suggested_filename: &str) -> Result<String>;
}
