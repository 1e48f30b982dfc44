//! Customer behavioral state
//!
//! A [`CustomerProfile`] holds the running aggregates for one customer and a
//! bounded [`ActivityWindow`] of recent transactions. Profiles are created
//! lazily on a customer's first transaction and mutated exactly once per
//! successfully processed transaction; they are never deleted here.

use crate::types::record::{Location, Transaction};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Bounds for the per-customer activity window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum age of an entry relative to the newest entry, in seconds
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,

    /// Maximum number of entries retained
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_age_secs() -> i64 {
    86_400
}

fn default_max_entries() -> usize {
    50
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            max_entries: default_max_entries(),
        }
    }
}

/// One recent transaction in a customer's activity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub amount: f64,
    pub transaction_id: String,
}

/// Bounded, event-time-ordered sequence of a customer's recent transactions.
///
/// Entries are kept sorted by event timestamp; a late-arriving record is
/// inserted in order, not appended. Eviction is measured against the newest
/// event timestamp held in the window, never the wall clock, so replaying
/// the same records always produces the same window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityWindow {
    entries: Vec<WindowEntry>,
    config: WindowConfig,
}

impl ActivityWindow {
    /// Create an empty window with the given bounds
    pub fn new(config: WindowConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    /// Insert an entry in event-timestamp order, then evict by age and count
    pub fn push(&mut self, entry: WindowEntry) {
        let index = self
            .entries
            .iter()
            .rposition(|e| e.timestamp <= entry.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.entries.insert(index, entry);

        if let Some(newest) = self.entries.last().map(|e| e.timestamp) {
            let cutoff = newest - Duration::seconds(self.config.max_age_secs);
            self.entries.retain(|e| e.timestamp > cutoff);
        }
        while self.entries.len() > self.config.max_entries {
            self.entries.remove(0);
        }
    }

    /// Count entries with `after < timestamp <= upto`
    pub fn count_between(
        &self,
        after: DateTime<FixedOffset>,
        upto: DateTime<FixedOffset>,
    ) -> usize {
        self.entries
            .iter()
            .filter(|e| e.timestamp > after && e.timestamp <= upto)
            .count()
    }

    /// Whether the window holds an entry for the given transaction
    pub fn contains(&self, transaction_id: &str) -> bool {
        self.entries.iter().any(|e| e.transaction_id == transaction_id)
    }

    pub fn entries(&self) -> &[WindowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-customer behavioral aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: String,

    /// Total transactions successfully processed for this customer
    pub transaction_count: u64,

    /// Running mean transaction amount, updated incrementally
    pub mean_amount: f64,

    /// Last known location with coordinates
    pub last_location: Option<Location>,

    /// Event timestamp at which `last_location` was observed
    pub last_location_at: Option<DateTime<FixedOffset>>,

    /// Number of transactions flagged as fraud
    pub flagged_count: u64,

    /// Identifier of the most recently applied transaction
    pub last_transaction_id: Option<String>,

    /// Event timestamp of the most recently applied transaction
    pub last_transaction_at: Option<DateTime<FixedOffset>>,
}

impl CustomerProfile {
    /// Create a fresh profile for a customer's first transaction
    pub fn new(customer_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            transaction_count: 0,
            mean_amount: 0.0,
            last_location: None,
            last_location_at: None,
            flagged_count: 0,
            last_transaction_id: None,
            last_transaction_at: None,
        }
    }

    /// Fold one transaction into the aggregates.
    ///
    /// The mean is updated incrementally from the count, so no per-amount
    /// history is needed. The last known location only advances when the
    /// transaction carries usable coordinates.
    pub fn record(&mut self, transaction: &Transaction, flagged: bool) {
        self.transaction_count += 1;
        let n = self.transaction_count as f64;
        self.mean_amount += (transaction.amount - self.mean_amount) / n;

        if flagged {
            self.flagged_count += 1;
        }

        if transaction.coordinates().is_some() {
            self.last_location = transaction.location.clone();
            self.last_location_at = Some(transaction.timestamp);
        }

        self.last_transaction_id = Some(transaction.transaction_id.clone());
        self.last_transaction_at = Some(transaction.timestamp);
    }
}
