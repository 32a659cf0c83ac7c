//! Local report archive
//!
//! Writes rendered reports into a directory and returns a content-addressed
//! id in place of a Git commit id.

use crate::providers::GitCommitter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Length of the returned id, matching a Git object id
const COMMIT_ID_LEN: usize = 40;
const INDEX_FILE: &str = "INDEX";

pub struct ArchiveCommitter {
    dir: PathBuf,
}

impl ArchiveCommitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Id over filename and content, so re-archiving the same report is stable
pub fn commit_id(filename: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(COMMIT_ID_LEN);
    id
}

#[async_trait]
impl GitCommitter for ArchiveCommitter {
    async fn commit(&self, content: &str, suggested_filename: &str) -> Result<String> {
        create_dir_all(&self.dir)
            .await
            .context("Failed to create archive directory")?;

        // Only the final path component is trusted
        let filename = Path::new(suggested_filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.md".to_string());

        let path = self.dir.join(&filename);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;

        let id = commit_id(&filename, content);
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(INDEX_FILE))
            .await
            .context("Failed to open archive index")?;
        index
            .write_all(format!("{} {}\n", id, filename).as_bytes())
            .await
            .context("Failed to update archive index")?;

        info!("Archived {} as {}", filename, id);
        Ok(id)
    }
}
