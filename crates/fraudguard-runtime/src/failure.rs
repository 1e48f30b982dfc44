//! Failure classification, retry and dead-lettering
//!
//! The coordinator drives every record to a terminal outcome: validation
//! and permanent store errors dead-letter immediately, transient errors are
//! retried with exponential backoff and escalate to the dead-letter path
//! once the attempt budget is spent. A poison record therefore never stalls
//! its partition. The only non-terminal outcome is a shutdown arriving
//! while a retry is pending; the record is then left for redelivery.

use crate::error::{ErrorClass, Result, RuntimeError};
use crate::observability::PipelineMetrics;
use crate::retry::RetryPolicy;
use crate::storage::DeadLetterSink;
use crate::writer::WriteOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why a record was dead-lettered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterKind {
    /// Malformed or schema-invalid input; permanent by definition
    Validation,

    /// A transient failure that exhausted its retry budget
    TransientExhausted,

    /// A store failure retries cannot fix
    Permanent,
}

/// Record preserved for manual inspection or replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub raw_payload: serde_json::Value,
    pub error_kind: DeadLetterKind,
    pub error_detail: String,
    pub attempt_count: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

/// Terminal (or deferred) outcome for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Scored and durably stored for the first time
    Stored,

    /// Redelivery of an already-stored transaction
    Duplicate,

    /// Preserved in the dead-letter sink
    DeadLettered,

    /// Interrupted before reaching a terminal outcome; the record must be
    /// redelivered
    Retriable,
}

impl RecordOutcome {
    /// Terminal outcomes let the partition checkpoint advance past the record
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordOutcome::Retriable)
    }
}

/// Classifies pipeline errors and owns the retry/dead-letter policy
pub struct FailureCoordinator {
    policy: RetryPolicy,
    dead_letters: Arc<dyn DeadLetterSink>,
    metrics: Arc<PipelineMetrics>,
}

impl FailureCoordinator {
    pub fn new(
        policy: RetryPolicy,
        dead_letters: Arc<dyn DeadLetterSink>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            policy,
            dead_letters,
            metrics,
        }
    }

    /// Dead-letter a record that failed validation, without retrying
    pub async fn reject(
        &self,
        raw: &serde_json::Value,
        err: RuntimeError,
    ) -> RecordOutcome {
        self.metrics.validation_failures.inc();
        let now = Utc::now();
        self.dead_letter(raw, DeadLetterKind::Validation, err.to_string(), 1, now, now)
            .await
    }

    /// Drive `op` to a terminal outcome under the retry policy.
    ///
    /// When `shutdown` flips to true while a retry is pending, the in-flight
    /// attempt is allowed to finish but no further attempt starts; the
    /// record is reported as retriable so redelivery resumes there.
    pub async fn run<F, Fut>(
        &self,
        raw: &serde_json::Value,
        mut op: F,
        mut shutdown: Option<watch::Receiver<bool>>,
    ) -> RecordOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<WriteOutcome>>,
    {
        let mut attempts = 0u32;
        let mut first_failed_at: Option<DateTime<Utc>> = None;

        loop {
            attempts += 1;
            match op().await {
                Ok(WriteOutcome::Stored) => return RecordOutcome::Stored,
                Ok(WriteOutcome::Duplicate) => return RecordOutcome::Duplicate,
                Err(err) => {
                    let now = Utc::now();
                    let first = *first_failed_at.get_or_insert(now);

                    match err.class() {
                        ErrorClass::Validation => {
                            return self
                                .dead_letter(
                                    raw,
                                    DeadLetterKind::Validation,
                                    err.to_string(),
                                    attempts,
                                    first,
                                    now,
                                )
                                .await;
                        }
                        ErrorClass::Permanent => {
                            return self
                                .dead_letter(
                                    raw,
                                    DeadLetterKind::Permanent,
                                    err.to_string(),
                                    attempts,
                                    first,
                                    now,
                                )
                                .await;
                        }
                        ErrorClass::Transient => {
                            if attempts >= self.policy.max_attempts {
                                warn!(
                                    attempts,
                                    error = %err,
                                    "transient failure exhausted retries, escalating"
                                );
                                return self
                                    .dead_letter(
                                        raw,
                                        DeadLetterKind::TransientExhausted,
                                        err.to_string(),
                                        attempts,
                                        first,
                                        now,
                                    )
                                    .await;
                            }

                            let delay = self.policy.delay_for(attempts - 1);
                            debug!(
                                attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "transient failure, backing off"
                            );
                            self.metrics.retries.inc();

                            match shutdown.as_mut() {
                                Some(rx) => {
                                    if *rx.borrow() {
                                        info!("shutdown requested, deferring record");
                                        return RecordOutcome::Retriable;
                                    }
                                    tokio::select! {
                                        _ = tokio::time::sleep(delay) => {}
                                        changed = rx.changed() => {
                                            if changed.is_ok() && *rx.borrow() {
                                                info!("shutdown requested, deferring record");
                                                return RecordOutcome::Retriable;
                                            }
                                            // Sender gone: finish the backoff
                                            tokio::time::sleep(delay).await;
                                        }
                                    }
                                }
                                None => tokio::time::sleep(delay).await,
                            }
                        }
                    }
                }
            }
        }
    }

    async fn dead_letter(
        &self,
        raw: &serde_json::Value,
        kind: DeadLetterKind,
        detail: String,
        attempt_count: u32,
        first_failed_at: DateTime<Utc>,
        last_failed_at: DateTime<Utc>,
    ) -> RecordOutcome {
        let entry = DeadLetterEntry {
            id: Uuid::new_v4(),
            raw_payload: raw.clone(),
            error_kind: kind,
            error_detail: detail,
            attempt_count,
            first_failed_at,
            last_failed_at,
        };

        error!(
            entry_id = %entry.id,
            kind = ?kind,
            attempts = attempt_count,
            detail = %entry.error_detail,
            "dead-lettering record"
        );
        self.metrics.dead_lettered.inc();

        if let Err(publish_err) = self.dead_letters.publish(entry).await {
            // Nothing left to do but log; the record outcome is still terminal
            error!(error = %publish_err, "failed to publish dead-letter entry");
        }

        RecordOutcome::DeadLettered
    }
}
