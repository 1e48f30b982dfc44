//! Filesystem archive backend
//!
//! Writes each raw record as a JSON file under a time-partitioned directory
//! tree, `year=YYYY/month=MM/day=DD/hour=HH/<transaction_id>.json`, keyed by
//! the event timestamp so analytics replay can prune by time range.

use super::{archived_record, ArchiveSink};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Archive sink backed by a local directory tree
pub struct FileArchiveSink {
    root: PathBuf,
}

impl FileArchiveSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, event_time: &DateTime<FixedOffset>) -> PathBuf {
        self.root
            .join(format!("year={:04}", event_time.year()))
            .join(format!("month={:02}", event_time.month()))
            .join(format!("day={:02}", event_time.day()))
            .join(format!("hour={:02}", event_time.hour()))
    }
}

#[async_trait]
impl ArchiveSink for FileArchiveSink {
    async fn append(
        &self,
        event_time: &DateTime<FixedOffset>,
        record: &serde_json::Value,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let dir = self.partition_dir(event_time);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RuntimeError::TransientStore(format!("archive mkdir: {}", e)))?;

        let transaction_id = record
            .get("transaction_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let path = dir.join(format!("{}.json", transaction_id));
        let bytes = serde_json::to_vec(&archived_record(record, processed_at))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| RuntimeError::TransientStore(format!("archive write: {}", e)))?;

        debug!(path = %path.display(), "archived raw record");
        Ok(())
    }
}
