//! Runtime error types
//!
//! Every error the pipeline can raise maps onto one of three classes that
//! drive the failure-handling policy: validation failures are permanent and
//! never retried, transient store failures are retried with backoff, and
//! permanent store failures go straight to the dead-letter path. Version
//! conflicts are a local retry signal consumed inside the profile update
//! loop and are only seen elsewhere if that loop gives up.

use fraudguard_core::types::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Malformed or schema-invalid input
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Optimistic-concurrency conflict on a profile update
    #[error("Version conflict for customer {customer_id}: expected {expected}, found {found}")]
    Conflict {
        customer_id: String,
        expected: u64,
        found: u64,
    },

    /// Temporary store unavailability; worth retrying
    #[error("Transient store error: {0}")]
    TransientStore(String),

    /// A store call exceeded its deadline
    #[error("Store call timed out after {0} ms")]
    StoreTimeout(u64),

    /// Store rejected the operation in a way retries cannot fix
    #[error("Permanent store error: {0}")]
    PermanentStore(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Failure class used by the retry and dead-letter policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Transient,
    Permanent,
}

impl RuntimeError {
    /// Classify this error for the failure policy
    pub fn class(&self) -> ErrorClass {
        match self {
            RuntimeError::Validation(_) => ErrorClass::Validation,
            RuntimeError::Conflict { .. }
            | RuntimeError::TransientStore(_)
            | RuntimeError::StoreTimeout(_)
            | RuntimeError::Stream(_) => ErrorClass::Transient,
            RuntimeError::PermanentStore(_)
            | RuntimeError::Serialization(_)
            | RuntimeError::Config(_) => ErrorClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_class() {
        let err = RuntimeError::Validation(ValidationError::RequiredFieldMissing {
            field: "amount".to_string(),
        });
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[test]
    fn test_transient_classes() {
        assert_eq!(
            RuntimeError::TransientStore("throttled".to_string()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RuntimeError::StoreTimeout(5000).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            RuntimeError::Conflict {
                customer_id: "cust_000001".to_string(),
                expected: 3,
                found: 4
            }
            .class(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn test_permanent_class() {
        assert_eq!(
            RuntimeError::PermanentStore("access denied".to_string()).class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn test_error_messages() {
        let err = RuntimeError::Conflict {
            customer_id: "cust_000001".to_string(),
            expected: 3,
            found: 4,
        };
        assert!(err.to_string().contains("cust_000001"));
        assert!(err.to_string().contains("expected 3"));

        let err = RuntimeError::StoreTimeout(250);
        assert!(err.to_string().contains("250 ms"));
    }
}
