//! Transaction record types
//!
//! This module contains the wire-level and domain types for transaction
//! processing:
//! - Raw input records as delivered by the upstream stream
//! - Validated transactions
//! - Scored output records
//! - Input validation

pub mod record;
pub mod scored;
pub mod validator;

pub use record::{Location, RawRecord, Transaction};
pub use scored::{ScoredTransaction, ScoringResult};
pub use validator::{RecordValidator, ValidationError};
