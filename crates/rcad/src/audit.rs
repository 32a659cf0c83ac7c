//! Diagnosis audit trail
//!
//! One JSON line per `diagnose` call, success or failure, in the order the
//! calls finished. Lines that no longer parse are skipped on read.

use crate::providers::AuditSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rca_common::AuditRecord;
use std::path::PathBuf;
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// JSONL sink for diagnosis audit records
pub struct AuditLogger {
    log_path: PathBuf,
    /// Concurrent diagnoses append whole lines, never interleaved bytes
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Parent directories of `log_path` are created up front
    pub async fn new(log_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create audit directory {}", parent.display()))?;
        }

        info!("Recording diagnoses to {}", log_path.display());

        Ok(Self {
            log_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Recorded diagnoses, oldest first, optionally narrowed to one entity
    pub async fn history(&self, entity_ref: Option<&str>) -> Result<Vec<AuditRecord>> {
        if !self.log_path.exists() {
            return Ok(vec![]);
        }

        let content = tokio::fs::read_to_string(&self.log_path)
            .await
            .with_context(|| format!("Failed to read audit log {}", self.log_path.display()))?;

        let mut skipped = 0usize;
        let records: Vec<AuditRecord> = content
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let parsed = serde_json::from_str::<AuditRecord>(line).ok();
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .filter(|record| entity_ref.map_or(true, |wanted| record.entity_ref == wanted))
            .collect();

        if skipped > 0 {
            warn!("Skipped {} unreadable audit lines in {}", skipped, self.log_path.display());
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSink for AuditLogger {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let json = serde_json::to_string(record)? + "\n";
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .context("Failed to open audit log")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write audit record")?;

        file.sync_all().await.context("Failed to sync audit log")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rca_common::audit::ACTION_DIAGNOSE;
    use rca_common::SourceKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_audit_logging() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("nested").join("audit.jsonl");

        let logger = AuditLogger::new(&log_path).await.unwrap();

        let record = AuditRecord {
            timestamp: Utc::now(),
            action: ACTION_DIAGNOSE.to_string(),
            entity_ref: "component:default/checkout".to_string(),
            duration_ms: 1200,
            confidence_score: Some(75),
            data_sources_used: vec![SourceKind::KubernetesContext, SourceKind::LogAnomalies],
            success: true,
            error: None,
            version: rca_common::VERSION.to_string(),
        };

        logger.record(&record).await.unwrap();
        logger.record(&record).await.unwrap();

        let records = logger.history(None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record);
    }

    #[tokio::test]
    async fn test_history_filters_by_entity_and_skips_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&log_path).await.unwrap();

        for entity in ["component:a", "component:b"] {
            let record = AuditRecord {
                timestamp: Utc::now(),
                action: ACTION_DIAGNOSE.to_string(),
                entity_ref: entity.to_string(),
                duration_ms: 10,
                confidence_score: None,
                data_sources_used: vec![],
                success: false,
                error: Some("entity_resolution".to_string()),
                version: rca_common::VERSION.to_string(),
            };
            logger.record(&record).await.unwrap();
        }
        let mut raw = std::fs::read_to_string(&log_path).unwrap();
        raw.push_str("{not json\n");
        std::fs::write(&log_path, raw).unwrap();

        let only_b = logger.history(Some("component:b")).await.unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].entity_ref, "component:b");
        assert_eq!(logger.history(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_read_missing_log_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp_dir.path().join("audit.jsonl")).await.unwrap();
        assert!(logger.history(None).await.unwrap().is_empty());
    }
}
