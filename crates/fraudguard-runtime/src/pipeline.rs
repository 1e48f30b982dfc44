//! End-to-end record processing
//!
//! [`TransactionProcessor`] ties the stages together for one record:
//! validate the raw payload, snapshot the customer's profile and activity
//! window, score with the rule engine, then hand off to the persistence
//! writer. Everything after validation runs under the failure coordinator,
//! so transient store trouble is retried as a unit and the read-score-write
//! sequence starts from a fresh snapshot on every attempt.

use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::failure::{FailureCoordinator, RecordOutcome};
use crate::observability::PipelineMetrics;
use crate::storage::{
    timed, ArchiveSink, DeadLetterSink, ProfileStore, TransactionStore,
};
use crate::writer::{PersistenceWriter, WriteOutcome};
use fraudguard_core::profile::{ActivityWindow, WindowConfig};
use fraudguard_core::rules::RuleEngine;
use fraudguard_core::types::{RecordValidator, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Processes raw stream records into scored, durably stored transactions
pub struct TransactionProcessor {
    validator: RecordValidator,
    engine: RuleEngine,
    writer: PersistenceWriter,
    profiles: Arc<dyn ProfileStore>,
    coordinator: FailureCoordinator,
    metrics: Arc<PipelineMetrics>,
    window: WindowConfig,
    store_timeout: Duration,
}

impl TransactionProcessor {
    pub fn new(
        config: ProcessorConfig,
        profiles: Arc<dyn ProfileStore>,
        transactions: Arc<dyn TransactionStore>,
        archive: Arc<dyn ArchiveSink>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(PipelineMetrics::new());
        let writer = PersistenceWriter::new(
            transactions,
            Arc::clone(&profiles),
            archive,
            Arc::clone(&metrics),
            &config,
        );
        let coordinator = FailureCoordinator::new(
            config.retry.clone(),
            dead_letters,
            Arc::clone(&metrics),
        );

        Ok(Self {
            validator: RecordValidator::new(),
            engine: RuleEngine::new(config.rules.clone()),
            writer,
            profiles,
            coordinator,
            metrics,
            window: config.window.clone(),
            store_timeout: config.store_timeout(),
        })
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Process one raw record to a terminal outcome
    pub async fn process(&self, raw: &serde_json::Value) -> RecordOutcome {
        self.process_with_shutdown(raw, None).await
    }

    /// Process one raw record; a shutdown signal defers pending retries
    pub async fn process_with_shutdown(
        &self,
        raw: &serde_json::Value,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> RecordOutcome {
        let started = Instant::now();

        let transaction = match self.validator.validate(raw) {
            Ok(transaction) => transaction,
            Err(err) => {
                warn!(error = %err, "record failed validation");
                let outcome = self.coordinator.reject(raw, err.into()).await;
                self.metrics
                    .processing_seconds
                    .observe(started.elapsed().as_secs_f64());
                return outcome;
            }
        };

        let outcome = self
            .coordinator
            .run(
                raw,
                || {
                    let transaction = transaction.clone();
                    async move { self.score_and_persist(&transaction, raw).await }
                },
                shutdown,
            )
            .await;

        self.metrics
            .processing_seconds
            .observe(started.elapsed().as_secs_f64());
        outcome
    }

    /// One attempt: snapshot state, score, persist
    async fn score_and_persist(
        &self,
        transaction: &Transaction,
        raw: &serde_json::Value,
    ) -> Result<WriteOutcome> {
        let snapshot = timed(
            self.store_timeout,
            self.profiles.get(&transaction.customer_id),
        )
        .await?;

        let empty_window = ActivityWindow::new(self.window.clone());
        let (profile, window) = match snapshot.as_ref() {
            Some(snap) => (Some(&snap.profile), &snap.window),
            None => (None, &empty_window),
        };

        let scoring = self.engine.evaluate(transaction, profile, window);
        debug!(
            transaction_id = %transaction.transaction_id,
            risk_score = scoring.risk_score,
            is_fraud = scoring.is_fraud,
            "scored transaction"
        );

        self.writer.persist(transaction, &scoring, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        InMemoryArchiveSink, InMemoryDeadLetterSink, InMemoryProfileStore,
        InMemoryTransactionStore,
    };
    use serde_json::json;

    struct Fixture {
        profiles: Arc<InMemoryProfileStore>,
        transactions: Arc<InMemoryTransactionStore>,
        dead_letters: Arc<InMemoryDeadLetterSink>,
        processor: TransactionProcessor,
    }

    fn fixture() -> Fixture {
        let profiles = Arc::new(InMemoryProfileStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let dead_letters = Arc::new(InMemoryDeadLetterSink::new());
        let processor = TransactionProcessor::new(
            ProcessorConfig::default(),
            Arc::clone(&profiles) as Arc<dyn ProfileStore>,
            Arc::clone(&transactions) as Arc<dyn TransactionStore>,
            Arc::new(InMemoryArchiveSink::new()) as Arc<dyn ArchiveSink>,
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
        )
        .unwrap();

        Fixture {
            profiles,
            transactions,
            dead_letters,
            processor,
        }
    }

    fn record(id: &str, amount: f64, timestamp: &str) -> serde_json::Value {
        json!({
            "transaction_id": id,
            "customer_id": "cust_000001",
            "amount": amount,
            "currency": "USD",
            "merchant_id": "merch_0001",
            "merchant_category": "grocery",
            "timestamp": timestamp
        })
    }

    #[tokio::test]
    async fn test_clean_record_is_stored() {
        let fx = fixture();
        let outcome = fx
            .processor
            .process(&record("txn_001", 50.0, "2024-03-15T12:00:00Z"))
            .await;

        assert_eq!(outcome, RecordOutcome::Stored);
        let stored = fx.transactions.get("txn_001").await.unwrap().unwrap();
        assert_eq!(stored.risk_score, 0.0);
        assert!(stored.fraud_reasons.is_empty());

        let snapshot = fx.profiles.get("cust_000001").await.unwrap().unwrap();
        assert_eq!(snapshot.profile.transaction_count, 1);
        assert_eq!(snapshot.profile.mean_amount, 50.0);
    }

    #[tokio::test]
    async fn test_invalid_record_is_dead_lettered() {
        let fx = fixture();
        let outcome = fx.processor.process(&json!({"customer_id": "c1"})).await;

        assert_eq!(outcome, RecordOutcome::DeadLettered);
        assert!(fx.transactions.is_empty().await);
        assert!(fx.profiles.is_empty().await);
        assert_eq!(fx.dead_letters.len(), 1);
        assert_eq!(fx.processor.metrics().snapshot().validation_failures, 1);
    }

    #[tokio::test]
    async fn test_scoring_sees_state_before_the_transaction() {
        let fx = fixture();

        // Build a mean of 100 over two transactions
        fx.processor
            .process(&record("txn_001", 50.0, "2024-03-15T10:00:00Z"))
            .await;
        fx.processor
            .process(&record("txn_002", 150.0, "2024-03-15T10:30:00Z"))
            .await;

        // 301 > 3 x 100 triggers the amount anomaly
        let outcome = fx
            .processor
            .process(&record("txn_003", 301.0, "2024-03-15T11:00:00Z"))
            .await;
        assert_eq!(outcome, RecordOutcome::Stored);

        let stored = fx.transactions.get("txn_003").await.unwrap().unwrap();
        assert!(stored
            .fraud_reasons
            .contains(&"amount_anomaly".to_string()));
    }
}
