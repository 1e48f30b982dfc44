//! FraudGuard Runtime - Stream ingestion and scoring pipeline
//!
//! This crate wires the pure rule engine from `fraudguard-core` into a
//! running pipeline: partitioned batch dispatch, durable persistence with
//! idempotent re-processing, optimistic profile updates, and dead-lettering
//! of records that cannot be processed.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod failure;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod stream;
pub mod writer;

// Re-export main types
pub use config::ProcessorConfig;
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use error::{ErrorClass, Result, RuntimeError};
pub use failure::{DeadLetterEntry, DeadLetterKind, FailureCoordinator, RecordOutcome};
pub use observability::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::TransactionProcessor;
pub use retry::RetryPolicy;
pub use storage::{
    ArchiveSink, DeadLetterSink, FileArchiveSink, InMemoryArchiveSink, InMemoryDeadLetterSink,
    InMemoryProfileStore, InMemoryTransactionStore, InsertOutcome, ProfileSnapshot, ProfileStore,
    TransactionStore,
};
pub use stream::{InMemoryStream, RecordStream, StreamRecord};
pub use writer::{PersistenceWriter, WriteOutcome};
