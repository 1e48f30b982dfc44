//! In-memory storage backends
//!
//! Suitable for tests and embedding; data is lost when the process exits.
//! The profile store implements the same compare-and-swap discipline a
//! production backend would, so concurrency behavior is identical.

use super::{ArchiveSink, DeadLetterSink, InsertOutcome, ProfileSnapshot, ProfileStore, TransactionStore};
use crate::error::{Result, RuntimeError};
use crate::failure::DeadLetterEntry;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use fraudguard_core::profile::{ActivityWindow, CustomerProfile};
use fraudguard_core::types::ScoredTransaction;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;

/// In-memory profile store with versioned compare-and-swap updates
pub struct InMemoryProfileStore {
    entries: RwLock<HashMap<String, ProfileSnapshot>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of customers with state (for tests)
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, customer_id: &str) -> Result<Option<ProfileSnapshot>> {
        Ok(self.entries.read().await.get(customer_id).cloned())
    }

    async fn apply(
        &self,
        customer_id: &str,
        profile: CustomerProfile,
        window: ActivityWindow,
        expected_version: Option<u64>,
    ) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let current_version = entries.get(customer_id).map(|s| s.version);

        let new_version = match (current_version, expected_version) {
            (None, None) => 1,
            (Some(found), Some(expected)) if found == expected => expected + 1,
            (found, expected) => {
                return Err(RuntimeError::Conflict {
                    customer_id: customer_id.to_string(),
                    expected: expected.unwrap_or(0),
                    found: found.unwrap_or(0),
                });
            }
        };

        entries.insert(
            customer_id.to_string(),
            ProfileSnapshot {
                profile,
                window,
                version: new_version,
            },
        );
        Ok(new_version)
    }
}

/// In-memory scored-transaction store
pub struct InMemoryTransactionStore {
    records: RwLock<HashMap<String, ScoredTransaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored transactions (for tests)
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert_if_absent(&self, record: ScoredTransaction) -> Result<InsertOutcome> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.transaction_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        records.insert(record.transaction_id.clone(), record);
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, transaction_id: &str) -> Result<Option<ScoredTransaction>> {
        Ok(self.records.read().await.get(transaction_id).cloned())
    }
}

/// In-memory archive; records the augmented payloads for verification
pub struct InMemoryArchiveSink {
    records: Mutex<Vec<serde_json::Value>>,
}

impl InMemoryArchiveSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// All archived records (for tests)
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl Default for InMemoryArchiveSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveSink for InMemoryArchiveSink {
    async fn append(
        &self,
        _event_time: &DateTime<FixedOffset>,
        record: &serde_json::Value,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let archived = super::archived_record(record, processed_at);
        self.records.lock().unwrap().push(archived);
        Ok(())
    }
}

/// In-memory dead-letter sink; retains entries for inspection
pub struct InMemoryDeadLetterSink {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// All dead-lettered entries (for tests and replay tooling)
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for InMemoryDeadLetterSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn publish(&self, entry: DeadLetterEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}
