//! Shared fixtures for integration tests

use fraudguard_runtime::{
    ArchiveSink, DeadLetterSink, InMemoryArchiveSink, InMemoryDeadLetterSink, InMemoryProfileStore,
    InMemoryTransactionStore, ProcessorConfig, ProfileStore, TransactionProcessor,
    TransactionStore,
};
use serde_json::json;
use std::sync::Arc;

pub struct TestHarness {
    pub profiles: Arc<InMemoryProfileStore>,
    pub transactions: Arc<InMemoryTransactionStore>,
    pub archive: Arc<InMemoryArchiveSink>,
    pub dead_letters: Arc<InMemoryDeadLetterSink>,
    pub processor: Arc<TransactionProcessor>,
}

pub fn harness(config: ProcessorConfig) -> TestHarness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudguard_runtime=warn".into()),
        )
        .try_init();

    let profiles = Arc::new(InMemoryProfileStore::new());
    let transactions = Arc::new(InMemoryTransactionStore::new());
    let archive = Arc::new(InMemoryArchiveSink::new());
    let dead_letters = Arc::new(InMemoryDeadLetterSink::new());

    let processor = TransactionProcessor::new(
        config,
        Arc::clone(&profiles) as Arc<dyn ProfileStore>,
        Arc::clone(&transactions) as Arc<dyn TransactionStore>,
        Arc::clone(&archive) as Arc<dyn ArchiveSink>,
        Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
    )
    .expect("processor construction");

    TestHarness {
        profiles,
        transactions,
        archive,
        dead_letters,
        processor: Arc::new(processor),
    }
}

pub fn record(id: &str, customer: &str, amount: f64, timestamp: &str) -> serde_json::Value {
    json!({
        "transaction_id": id,
        "customer_id": customer,
        "account_id": format!("acc_{customer}"),
        "transaction_type": "purchase",
        "amount": amount,
        "currency": "USD",
        "merchant_id": "merch_grocery_0001",
        "merchant_category": "grocery",
        "payment_method": "card",
        "card_present": true,
        "timestamp": timestamp
    })
}
