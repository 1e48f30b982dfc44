//! Partitioned record stream
//!
//! The upstream stream is modeled as a lazy, restartable, partition-ordered
//! sequence with explicit per-partition checkpoints. Records in one
//! partition are always delivered in order; different partitions are
//! independent. A consumer resumes from its committed checkpoint, which is
//! what makes redelivery after a failure land on the first unacknowledged
//! record.

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One raw record as delivered by the stream
#[derive(Debug, Clone)]
pub struct StreamRecord {
    /// Partition this record was routed to
    pub partition: String,

    /// Position within the partition, starting at 1
    pub sequence: u64,

    /// Raw JSON payload
    pub payload: serde_json::Value,
}

/// Partition-ordered record stream with per-partition checkpoints
#[async_trait]
pub trait RecordStream: Send + Sync {
    /// Known partitions, in a stable order
    async fn partitions(&self) -> Result<Vec<String>>;

    /// Fetch up to `limit` records strictly after `from_sequence`, in
    /// partition order
    async fn fetch(
        &self,
        partition: &str,
        from_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StreamRecord>>;

    /// Advance the partition checkpoint. Everything at or before `sequence`
    /// is acknowledged and will not be redelivered.
    async fn commit(&self, partition: &str, sequence: u64) -> Result<()>;

    /// Last committed checkpoint for a partition (0 when none)
    async fn committed(&self, partition: &str) -> Result<u64>;
}

#[derive(Debug, Default)]
struct PartitionState {
    records: Vec<StreamRecord>,
    committed: u64,
}

/// In-memory stream backend for tests and embedding
pub struct InMemoryStream {
    partitions: RwLock<HashMap<String, PartitionState>>,
}

impl InMemoryStream {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Append a payload to a partition, returning its sequence number
    pub async fn publish(&self, partition: &str, payload: serde_json::Value) -> u64 {
        let mut partitions = self.partitions.write().await;
        let state = partitions.entry(partition.to_string()).or_default();
        let sequence = state.records.len() as u64 + 1;
        state.records.push(StreamRecord {
            partition: partition.to_string(),
            sequence,
            payload,
        });
        sequence
    }
}

impl Default for InMemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStream for InMemoryStream {
    async fn partitions(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.partitions.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn fetch(
        &self,
        partition: &str,
        from_sequence: u64,
        limit: usize,
    ) -> Result<Vec<StreamRecord>> {
        let partitions = self.partitions.read().await;
        let Some(state) = partitions.get(partition) else {
            return Ok(Vec::new());
        };

        Ok(state
            .records
            .iter()
            .skip(from_sequence as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit(&self, partition: &str, sequence: u64) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        let state = partitions
            .get_mut(partition)
            .ok_or_else(|| RuntimeError::Stream(format!("unknown partition: {}", partition)))?;

        if sequence < state.committed {
            return Err(RuntimeError::Stream(format!(
                "checkpoint for {} would regress from {} to {}",
                partition, state.committed, sequence
            )));
        }
        state.committed = sequence;
        Ok(())
    }

    async fn committed(&self, partition: &str) -> Result<u64> {
        Ok(self
            .partitions
            .read()
            .await
            .get(partition)
            .map(|s| s.committed)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_assigns_dense_sequences() {
        let stream = InMemoryStream::new();
        assert_eq!(stream.publish("p0", json!({"n": 1})).await, 1);
        assert_eq!(stream.publish("p0", json!({"n": 2})).await, 2);
        assert_eq!(stream.publish("p1", json!({"n": 3})).await, 1);
    }

    #[tokio::test]
    async fn test_fetch_resumes_after_sequence() {
        let stream = InMemoryStream::new();
        for n in 1..=5 {
            stream.publish("p0", json!({"n": n})).await;
        }

        let batch = stream.fetch("p0", 2, 2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].sequence, 3);
        assert_eq!(batch[1].sequence, 4);
    }

    #[tokio::test]
    async fn test_fetch_unknown_partition_is_empty() {
        let stream = InMemoryStream::new();
        assert!(stream.fetch("nowhere", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_and_resume() {
        let stream = InMemoryStream::new();
        for n in 1..=3 {
            stream.publish("p0", json!({"n": n})).await;
        }

        assert_eq!(stream.committed("p0").await.unwrap(), 0);
        stream.commit("p0", 2).await.unwrap();
        assert_eq!(stream.committed("p0").await.unwrap(), 2);

        // A restarted consumer picks up right after the checkpoint
        let batch = stream.fetch("p0", 2, 10).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].sequence, 3);
    }

    #[tokio::test]
    async fn test_checkpoint_cannot_regress() {
        let stream = InMemoryStream::new();
        stream.publish("p0", json!({})).await;
        stream.publish("p0", json!({})).await;

        stream.commit("p0", 2).await.unwrap();
        assert!(stream.commit("p0", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_partitions_are_sorted() {
        let stream = InMemoryStream::new();
        stream.publish("p2", json!({})).await;
        stream.publish("p0", json!({})).await;
        stream.publish("p1", json!({})).await;

        assert_eq!(
            stream.partitions().await.unwrap(),
            vec!["p0".to_string(), "p1".to_string(), "p2".to_string()]
        );
    }
}
