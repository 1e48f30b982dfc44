//! FraudGuard Core - Domain types and fraud rule engine
//!
//! This crate provides the fundamental types used across the FraudGuard
//! pipeline:
//! - Transaction and customer profile types
//! - Input record validation
//! - The pure, data-driven rule engine
//! - Geodesic helpers for location checks

pub mod error;
pub mod geo;
pub mod profile;
pub mod rules;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use profile::{ActivityWindow, CustomerProfile, WindowConfig, WindowEntry};
pub use rules::{RuleEngine, RuleKind, RuleSet, RuleSpec};
pub use types::{
    Location, RawRecord, RecordValidator, ScoredTransaction, ScoringResult, Transaction,
    ValidationError,
};
