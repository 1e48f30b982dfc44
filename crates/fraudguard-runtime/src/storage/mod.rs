//! Storage layer for the scoring pipeline
//!
//! Async trait seams for the four sinks the pipeline writes to or reads
//! from: customer profiles, scored transactions, the raw-record archive and
//! the dead-letter queue. In-memory backends live in [`memory`]; a
//! filesystem archive backend lives in [`file`].

pub mod file;
pub mod memory;

pub use file::FileArchiveSink;
pub use memory::{
    InMemoryArchiveSink, InMemoryDeadLetterSink, InMemoryProfileStore, InMemoryTransactionStore,
};

use crate::error::{Result, RuntimeError};
use crate::failure::DeadLetterEntry;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use fraudguard_core::profile::{ActivityWindow, CustomerProfile};
use fraudguard_core::types::ScoredTransaction;
use std::future::Future;
use std::time::Duration;

/// Versioned view of one customer's state.
///
/// The profile and its activity window are stored together under a single
/// version counter, so one conditional write covers both and a retry can
/// never observe a torn pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSnapshot {
    pub profile: CustomerProfile,
    pub window: ActivityWindow,
    pub version: u64,
}

/// Keyed store of per-customer behavioral state with optimistic concurrency
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read the current snapshot for a customer, if one exists
    async fn get(&self, customer_id: &str) -> Result<Option<ProfileSnapshot>>;

    /// Conditionally write a new profile/window pair.
    ///
    /// `expected_version: None` creates the entry and fails on a concurrent
    /// create; `Some(v)` replaces the entry only while its version is still
    /// `v`. A mismatch yields [`RuntimeError::Conflict`] and the caller must
    /// re-read and retry. Returns the new version.
    async fn apply(
        &self,
        customer_id: &str,
        profile: CustomerProfile,
        window: ActivityWindow,
        expected_version: Option<u64>,
    ) -> Result<u64>;
}

/// Outcome of a conditional insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Durable store of scored transactions, keyed by transaction identifier
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert unless the key already exists. An existing key is a normal
    /// outcome, not an error: it is how redelivered records are detected.
    async fn insert_if_absent(&self, record: ScoredTransaction) -> Result<InsertOutcome>;

    async fn get(&self, transaction_id: &str) -> Result<Option<ScoredTransaction>>;
}

/// Append-only archive of raw input records, partitioned by event time
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn append(
        &self,
        event_time: &DateTime<FixedOffset>,
        record: &serde_json::Value,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Sink for records that could not be processed
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, entry: DeadLetterEntry) -> Result<()>;
}

/// The verbatim input record with `processed_at` stamped on
pub(crate) fn archived_record(
    record: &serde_json::Value,
    processed_at: DateTime<Utc>,
) -> serde_json::Value {
    let mut archived = record.clone();
    if let serde_json::Value::Object(map) = &mut archived {
        map.insert(
            "processed_at".to_string(),
            serde_json::Value::String(processed_at.to_rfc3339()),
        );
    }
    archived
}

/// Bound a store call by a deadline; an elapsed deadline is a transient
/// store error.
pub(crate) async fn timed<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::StoreTimeout(limit.as_millis() as u64)),
    }
}
