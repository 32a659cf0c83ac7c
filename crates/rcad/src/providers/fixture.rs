//! Fixture-backed collaborators
//!
//! Serves every data source from a directory of JSON captures:
//!
//! ```text
//! <dir>/entities.json            {"component:default/checkout": {"namespace": "...", "cluster": "..."}}
//! <dir>/kubernetes/<ns>.json     KubernetesContext
//! <dir>/logs/<ns>.json           LogAnomalies
//! <dir>/ai/<ns>.json             AiAnalysis
//! ```

use super::{
    AiAnalysisProvider, EntityResolver, KubernetesContextProvider, LogAnomalyProvider,
    ResolvedEntity,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rca_common::{AiAnalysis, AnalysisTarget, KubernetesContext, LogAnomalies, TimeRange};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ENTITIES_FILE: &str = "entities.json";
const KUBERNETES_DIR: &str = "kubernetes";
const LOGS_DIR: &str = "logs";
const AI_DIR: &str = "ai";

pub struct FixtureProviders {
    root: PathBuf,
}

impl FixtureProviders {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether an AI capture exists at all; without one the AI source is not wired
    pub fn has_ai(&self) -> bool {
        self.root.join(AI_DIR).is_dir()
    }

    fn namespace_file(&self, dir: &str, namespace: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}.json", namespace))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid fixture {}", path.display()))?;
    debug!("Loaded fixture {}", path.display());
    Ok(value)
}

#[async_trait]
impl EntityResolver for FixtureProviders {
    async fn resolve(&self, entity_ref: &str) -> Result<ResolvedEntity> {
        let entities: HashMap<String, ResolvedEntity> =
            read_json(&self.root.join(ENTITIES_FILE)).await?;
        entities
            .get(entity_ref)
            .cloned()
            .ok_or_else(|| anyhow!("entity '{}' not found in catalog", entity_ref))
    }
}

#[async_trait]
impl KubernetesContextProvider for FixtureProviders {
    async fn fetch_context(
        &self,
        namespace: &str,
        _cluster: &str,
        _time_range: TimeRange,
    ) -> Result<KubernetesContext> {
        read_json(&self.namespace_file(KUBERNETES_DIR, namespace)).await
    }
}

#[async_trait]
impl LogAnomalyProvider for FixtureProviders {
    async fn detect_anomalies(
        &self,
        namespace: &str,
        time_range: TimeRange,
        extra_patterns: &[String],
    ) -> Result<LogAnomalies> {
        let path = self.namespace_file(LOGS_DIR, namespace);
        let mut anomalies = match read_json::<LogAnomalies>(&path).await {
            Ok(anomalies) => anomalies,
            Err(e) => {
                warn!("Log anomaly fixture unavailable, returning empty result: {:#}", e);
                LogAnomalies::default()
            }
        };

        for pattern in extra_patterns {
            let needle = pattern.to_lowercase();
            let hits = anomalies
                .entries
                .iter()
                .filter(|entry| entry.message.to_lowercase().contains(&needle))
                .count();
            if hits > 0 && !anomalies.patterns.iter().any(|p| p.starts_with(pattern.as_str())) {
                anomalies.patterns.push(format!("{} ({}x)", pattern, hits));
            }
        }

        if anomalies.time_range.is_empty() {
            anomalies.time_range = time_range.to_string();
        }
        Ok(anomalies)
    }
}

#[async_trait]
impl AiAnalysisProvider for FixtureProviders {
    async fn analyze(&self, target: &AnalysisTarget) -> Result<AiAnalysis> {
        read_json(&self.namespace_file(AI_DIR, &target.namespace)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(ENTITIES_FILE),
            r#"{"component:default/checkout": {"namespace": "checkout", "cluster": "prod-eu"}}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join(LOGS_DIR)).unwrap();
        fs::write(
            dir.path().join(LOGS_DIR).join("checkout.json"),
            r#"{
                "entries": [
                    {"timestamp": "2026-10-19T10:00:00Z", "level": "ERROR", "message": "upstream connection refused"},
                    {"timestamp": "2026-10-19T10:00:05Z", "level": "ERROR", "message": "Connection refused by payments"}
                ],
                "error_count": 2,
                "patterns": []
            }"#,
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_resolve_from_catalog() {
        let dir = fixture_dir();
        let providers = FixtureProviders::new(dir.path());
        let entity = providers.resolve("component:default/checkout").await.unwrap();
        assert_eq!(entity.namespace, "checkout");
        assert_eq!(entity.cluster, "prod-eu");
        assert!(providers.resolve("component:default/unknown").await.is_err());
    }

    #[tokio::test]
    async fn test_logs_count_extra_patterns() {
        let dir = fixture_dir();
        let providers = FixtureProviders::new(dir.path());
        let anomalies = providers
            .detect_anomalies("checkout", TimeRange::FifteenMinutes, &["connection refused".to_string()])
            .await
            .unwrap();
        assert_eq!(anomalies.patterns, vec!["connection refused (2x)".to_string()]);
        assert_eq!(anomalies.time_range, "15m");
    }

    #[tokio::test]
    async fn test_missing_log_fixture_is_empty_not_error() {
        let dir = fixture_dir();
        let providers = FixtureProviders::new(dir.path());
        let anomalies = providers
            .detect_anomalies("unknown-ns", TimeRange::OneHour, &[])
            .await
            .unwrap();
        assert_eq!(anomalies.error_count, 0);
        assert!(anomalies.entries.is_empty());
    }

    #[tokio::test]
    async fn test_missing_kubernetes_fixture_errors() {
        let dir = fixture_dir();
        let providers = FixtureProviders::new(dir.path());
        assert!(providers
            .fetch_context("checkout", "prod-eu", TimeRange::OneHour)
            .await
            .is_err());
        assert!(!providers.has_ai());
    }
}
