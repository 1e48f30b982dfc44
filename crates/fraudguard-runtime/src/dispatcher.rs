//! Partitioned batch dispatch
//!
//! One worker per partition pulls batches from the stream and feeds records
//! through the processor strictly in arrival order; partitions run
//! concurrently. The partition checkpoint only advances past the contiguous
//! prefix of records that reached a terminal outcome, so redelivery after
//! an interruption resumes exactly at the first unfinished record. A failed
//! record never stops the rest of its batch from being processed.

use crate::error::{Result, RuntimeError};
use crate::failure::RecordOutcome;
use crate::pipeline::TransactionProcessor;
use crate::stream::RecordStream;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Counts of record outcomes across a dispatch run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub stored: u64,
    pub duplicates: u64,
    pub dead_lettered: u64,
    pub deferred: u64,
}

impl DispatchSummary {
    fn observe(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Stored => self.stored += 1,
            RecordOutcome::Duplicate => self.duplicates += 1,
            RecordOutcome::DeadLettered => self.dead_lettered += 1,
            RecordOutcome::Retriable => self.deferred += 1,
        }
    }

    fn merge(&mut self, other: &DispatchSummary) {
        self.stored += other.stored;
        self.duplicates += other.duplicates;
        self.dead_lettered += other.dead_lettered;
        self.deferred += other.deferred;
    }

    /// Total records that reached any outcome
    pub fn total(&self) -> u64 {
        self.stored + self.duplicates + self.dead_lettered + self.deferred
    }
}

/// Checkpoint after the contiguous prefix of terminal outcomes.
///
/// Batch order is delivery order, so the checkpoint walks the outcomes in
/// order and stops at the first record that must be redelivered.
fn contiguous_checkpoint(committed: u64, outcomes: &[(u64, RecordOutcome)]) -> u64 {
    let mut checkpoint = committed;
    for (sequence, outcome) in outcomes {
        if !outcome.is_terminal() {
            break;
        }
        checkpoint = *sequence;
    }
    checkpoint
}

/// Per-partition sequential consumer
struct PartitionWorker {
    partition: String,
    stream: Arc<dyn RecordStream>,
    processor: Arc<TransactionProcessor>,
    batch_size: usize,
    shutdown: watch::Receiver<bool>,
}

impl PartitionWorker {
    async fn run(self) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        loop {
            if *self.shutdown.borrow() {
                info!(partition = %self.partition, "shutdown requested, stopping worker");
                break;
            }

            let committed = self.stream.committed(&self.partition).await?;
            let batch = self
                .stream
                .fetch(&self.partition, committed, self.batch_size)
                .await?;
            if batch.is_empty() {
                break;
            }

            debug!(
                partition = %self.partition,
                records = batch.len(),
                from_sequence = committed,
                "processing batch"
            );

            let mut outcomes = Vec::with_capacity(batch.len());
            for record in &batch {
                // Finish the in-flight record on shutdown, but start no more
                if *self.shutdown.borrow() {
                    break;
                }
                let outcome = self
                    .processor
                    .process_with_shutdown(&record.payload, Some(self.shutdown.clone()))
                    .await;
                debug!(
                    partition = %self.partition,
                    sequence = record.sequence,
                    outcome = ?outcome,
                    "record processed"
                );
                summary.observe(outcome);
                outcomes.push((record.sequence, outcome));
            }

            let checkpoint = contiguous_checkpoint(committed, &outcomes);
            if checkpoint > committed {
                self.stream.commit(&self.partition, checkpoint).await?;
                debug!(
                    partition = %self.partition,
                    checkpoint,
                    "checkpoint committed"
                );
            }

            let blocked = outcomes.iter().any(|(_, outcome)| !outcome.is_terminal());
            let interrupted = outcomes.len() < batch.len();
            if blocked || interrupted {
                break;
            }
        }

        Ok(summary)
    }
}

/// Runs one worker per partition and aggregates their outcomes
pub struct Dispatcher {
    stream: Arc<dyn RecordStream>,
    processor: Arc<TransactionProcessor>,
    batch_size: usize,
    shutdown: watch::Sender<bool>,
}

impl Dispatcher {
    pub fn new(
        stream: Arc<dyn RecordStream>,
        processor: Arc<TransactionProcessor>,
        batch_size: usize,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            stream,
            processor,
            batch_size,
            shutdown,
        }
    }

    /// Process every partition until its records are exhausted or shutdown
    /// is signalled. Restartable: committed checkpoints make a second run
    /// skip everything already acknowledged.
    pub async fn run(&self) -> Result<DispatchSummary> {
        let partitions = self.stream.partitions().await?;
        info!(partitions = partitions.len(), "dispatching partitions");

        let mut handles = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let worker = PartitionWorker {
                partition,
                stream: Arc::clone(&self.stream),
                processor: Arc::clone(&self.processor),
                batch_size: self.batch_size,
                shutdown: self.shutdown.subscribe(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        let mut summary = DispatchSummary::default();
        let mut first_error = None;
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Ok(partition_summary)) => summary.merge(&partition_summary),
                Ok(Err(err)) => {
                    error!(error = %err, "partition worker failed");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    error!(error = %join_err, "partition worker panicked");
                    first_error.get_or_insert(RuntimeError::Stream(format!(
                        "worker task panicked: {}",
                        join_err
                    )));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!(
                    stored = summary.stored,
                    duplicates = summary.duplicates,
                    dead_lettered = summary.dead_lettered,
                    deferred = summary.deferred,
                    "dispatch complete"
                );
                Ok(summary)
            }
        }
    }

    /// Signal a graceful shutdown: in-flight records complete, checkpoints
    /// are committed, workers exit.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_advances_over_terminal_prefix() {
        let outcomes = vec![
            (1, RecordOutcome::Stored),
            (2, RecordOutcome::DeadLettered),
            (3, RecordOutcome::Duplicate),
        ];
        assert_eq!(contiguous_checkpoint(0, &outcomes), 3);
    }

    #[test]
    fn test_checkpoint_stops_at_non_terminal() {
        let outcomes = vec![
            (1, RecordOutcome::Stored),
            (2, RecordOutcome::Retriable),
            (3, RecordOutcome::Stored),
        ];
        // Record 3 was processed, but the checkpoint must hold at 1 so
        // record 2 is redelivered
        assert_eq!(contiguous_checkpoint(0, &outcomes), 1);
    }

    #[test]
    fn test_checkpoint_unchanged_when_first_record_blocks() {
        let outcomes = vec![(8, RecordOutcome::Retriable), (9, RecordOutcome::Stored)];
        assert_eq!(contiguous_checkpoint(7, &outcomes), 7);
    }

    #[test]
    fn test_checkpoint_empty_batch() {
        assert_eq!(contiguous_checkpoint(5, &[]), 5);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = DispatchSummary::default();
        summary.observe(RecordOutcome::Stored);
        summary.observe(RecordOutcome::Stored);
        summary.observe(RecordOutcome::DeadLettered);
        summary.observe(RecordOutcome::Retriable);

        assert_eq!(summary.stored, 2);
        assert_eq!(summary.dead_lettered, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.total(), 4);

        let mut other = DispatchSummary::default();
        other.observe(RecordOutcome::Duplicate);
        summary.merge(&other);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.total(), 5);
    }
}
