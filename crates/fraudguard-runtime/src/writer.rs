//! Durable persistence of scored transactions
//!
//! The writer owns the consistency contract between the transaction store
//! and the profile store. The two writes are not wrapped in a distributed
//! transaction; correctness comes from the idempotent insert gate plus
//! retry-until-success on the profile update. A crash between the two is
//! recovered on redelivery: the gate reports the existing record, and the
//! profile's applied-transaction markers show whether the update still
//! needs to run.

use crate::config::ProcessorConfig;
use crate::error::{Result, RuntimeError};
use crate::observability::PipelineMetrics;
use crate::storage::{
    timed, ArchiveSink, InsertOutcome, ProfileStore, TransactionStore,
};
use chrono::Utc;
use fraudguard_core::profile::{ActivityWindow, CustomerProfile, WindowConfig, WindowEntry};
use fraudguard_core::types::{ScoredTransaction, ScoringResult, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of persisting one scored transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// First time this transaction identifier was seen
    Stored,

    /// The identifier already existed; nothing was re-scored or re-counted
    Duplicate,
}

/// Writes scored transactions and applies profile updates
pub struct PersistenceWriter {
    transactions: Arc<dyn TransactionStore>,
    profiles: Arc<dyn ProfileStore>,
    archive: Arc<dyn ArchiveSink>,
    metrics: Arc<PipelineMetrics>,
    window: WindowConfig,
    store_timeout: Duration,
    max_conflict_retries: u32,
    archive_attempts: u32,
}

impl PersistenceWriter {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        profiles: Arc<dyn ProfileStore>,
        archive: Arc<dyn ArchiveSink>,
        metrics: Arc<PipelineMetrics>,
        config: &ProcessorConfig,
    ) -> Self {
        Self {
            transactions,
            profiles,
            archive,
            metrics,
            window: config.window.clone(),
            store_timeout: config.store_timeout(),
            max_conflict_retries: config.max_conflict_retries,
            archive_attempts: config.archive_attempts,
        }
    }

    /// Persist a scored transaction, update the customer profile, and
    /// archive the raw payload.
    pub async fn persist(
        &self,
        transaction: &Transaction,
        scoring: &ScoringResult,
        raw: &serde_json::Value,
    ) -> Result<WriteOutcome> {
        let processed_at = Utc::now();
        let record = ScoredTransaction::from_parts(transaction, scoring, processed_at);

        let gate = timed(
            self.store_timeout,
            self.transactions.insert_if_absent(record),
        )
        .await?;

        match gate {
            InsertOutcome::AlreadyExists => {
                debug!(
                    transaction_id = %transaction.transaction_id,
                    "redelivered transaction detected at idempotency gate"
                );
                self.metrics.duplicates.inc();
                // A crash may have landed between the insert and the profile
                // update; re-apply it unless the markers say it completed.
                self.update_profile(transaction, scoring).await?;
                Ok(WriteOutcome::Duplicate)
            }
            InsertOutcome::Inserted => {
                self.metrics.processed.inc();
                if scoring.is_fraud {
                    warn!(
                        transaction_id = %transaction.transaction_id,
                        customer_id = %transaction.customer_id,
                        risk_score = scoring.risk_score,
                        reasons = ?scoring.triggered,
                        "fraud detected"
                    );
                    self.metrics.fraud_detected.inc();
                }

                self.update_profile(transaction, scoring).await?;
                self.archive_best_effort(transaction, raw, processed_at).await;
                Ok(WriteOutcome::Stored)
            }
        }
    }

    /// Optimistic read-modify-write loop for the customer profile.
    ///
    /// Skips out if the profile already carries this transaction (the
    /// activity window holds its identifier, or it is the last applied
    /// transaction), which makes the update idempotent under redelivery and
    /// under concurrent duplicate processing.
    async fn update_profile(
        &self,
        transaction: &Transaction,
        scoring: &ScoringResult,
    ) -> Result<()> {
        let mut conflicts = 0u32;

        loop {
            let snapshot = timed(
                self.store_timeout,
                self.profiles.get(&transaction.customer_id),
            )
            .await?;

            if let Some(snap) = &snapshot {
                let already_applied = snap.window.contains(&transaction.transaction_id)
                    || snap.profile.last_transaction_id.as_deref()
                        == Some(transaction.transaction_id.as_str());
                if already_applied {
                    debug!(
                        transaction_id = %transaction.transaction_id,
                        "profile update already applied"
                    );
                    return Ok(());
                }
            }

            let (mut profile, mut window, expected_version) = match snapshot {
                Some(snap) => (snap.profile, snap.window, Some(snap.version)),
                None => (
                    CustomerProfile::new(&transaction.customer_id),
                    ActivityWindow::new(self.window.clone()),
                    None,
                ),
            };

            profile.record(transaction, scoring.is_fraud);
            window.push(WindowEntry {
                timestamp: transaction.timestamp,
                amount: transaction.amount,
                transaction_id: transaction.transaction_id.clone(),
            });

            let apply = self.profiles.apply(
                &transaction.customer_id,
                profile,
                window,
                expected_version,
            );
            match timed(self.store_timeout, apply).await {
                Ok(version) => {
                    debug!(
                        customer_id = %transaction.customer_id,
                        version,
                        "profile updated"
                    );
                    return Ok(());
                }
                Err(RuntimeError::Conflict { .. }) => {
                    conflicts += 1;
                    self.metrics.conflicts.inc();
                    if conflicts >= self.max_conflict_retries {
                        return Err(RuntimeError::TransientStore(format!(
                            "profile update for customer {} exhausted {} optimistic retries",
                            transaction.customer_id, conflicts
                        )));
                    }
                    debug!(
                        customer_id = %transaction.customer_id,
                        conflicts,
                        "profile version conflict, re-reading"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Append the raw payload to the archive. Failures are logged and
    /// retried a bounded number of times but never propagate: the archive
    /// serves analytics replay, not transactional correctness.
    async fn archive_best_effort(
        &self,
        transaction: &Transaction,
        raw: &serde_json::Value,
        processed_at: chrono::DateTime<Utc>,
    ) {
        for attempt in 1..=self.archive_attempts {
            let append = self
                .archive
                .append(&transaction.timestamp, raw, processed_at);
            match timed(self.store_timeout, append).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(
                        transaction_id = %transaction.transaction_id,
                        attempt,
                        error = %err,
                        "archive append failed"
                    );
                }
            }
        }
        warn!(
            transaction_id = %transaction.transaction_id,
            "giving up on archive append; transaction remains stored"
        );
    }
}
