//! Input record validation
//!
//! Validates raw stream records into [`Transaction`]s. Validation failures
//! are permanent: a record that fails here will fail identically on every
//! redelivery, so callers route these errors to the dead-letter path rather
//! than retrying.

use super::record::{RawRecord, Transaction};
use chrono::DateTime;
use thiserror::Error;

/// Validation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Required field missing or empty
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    /// Field present but out of range or otherwise unusable
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Payload is not a well-formed record at all
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Validator for raw transaction records
pub struct RecordValidator {
    /// Currencies accepted by the pipeline
    allowed_currencies: Vec<String>,
}

impl RecordValidator {
    /// Create a validator with the default currency set
    pub fn new() -> Self {
        Self {
            allowed_currencies: ["USD", "EUR", "GBP", "CAD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Override the accepted currency set
    pub fn with_currencies(mut self, currencies: Vec<String>) -> Self {
        self.allowed_currencies = currencies;
        self
    }

    /// Validate a raw JSON payload into a [`Transaction`]
    pub fn validate(&self, raw: &serde_json::Value) -> Result<Transaction, ValidationError> {
        let record: RawRecord = serde_json::from_value(raw.clone())
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        let transaction_id = required(record.transaction_id, "transaction_id")?;
        let customer_id = required(record.customer_id, "customer_id")?;
        let currency = required(record.currency, "currency")?;
        let merchant_id = required(record.merchant_id, "merchant_id")?;
        let merchant_category = required(record.merchant_category, "merchant_category")?;

        let amount = record
            .amount
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "amount".to_string(),
            })?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "amount".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        if !self.allowed_currencies.iter().any(|c| c == &currency) {
            return Err(ValidationError::InvalidValue {
                field: "currency".to_string(),
                reason: format!("unsupported currency: {}", currency),
            });
        }

        let timestamp_str =
            record
                .timestamp
                .ok_or_else(|| ValidationError::RequiredFieldMissing {
                    field: "timestamp".to_string(),
                })?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str).map_err(|e| {
            ValidationError::InvalidValue {
                field: "timestamp".to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Some(location) = &record.location {
            match (location.latitude, location.longitude) {
                (Some(lat), _) if !(-90.0..=90.0).contains(&lat) => {
                    return Err(ValidationError::InvalidValue {
                        field: "location.latitude".to_string(),
                        reason: format!("out of range: {}", lat),
                    });
                }
                (_, Some(lon)) if !(-180.0..=180.0).contains(&lon) => {
                    return Err(ValidationError::InvalidValue {
                        field: "location.longitude".to_string(),
                        reason: format!("out of range: {}", lon),
                    });
                }
                (Some(_), None) | (None, Some(_)) => {
                    return Err(ValidationError::InvalidValue {
                        field: "location".to_string(),
                        reason: "latitude and longitude must be provided together".to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(Transaction {
            transaction_id,
            customer_id,
            account_id: record.account_id,
            transaction_type: record.transaction_type,
            amount,
            currency,
            merchant_id,
            merchant_category,
            location: record.location,
            payment_method: record.payment_method,
            card_present: record.card_present,
            timestamp,
        })
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject missing or blank required string fields
fn required(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }),
    }
}
