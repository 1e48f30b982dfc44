//! Scored output records

use super::record::Transaction;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Result of evaluating a transaction against the rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Aggregated risk score, clamped to [0, 1]
    pub risk_score: f64,

    /// Names of the rules that triggered, in rule-set order
    pub triggered: Vec<String>,

    /// Whether the score exceeds the configured fraud threshold
    pub is_fraud: bool,
}

/// Durable output record for a processed transaction
///
/// Owned exclusively by the persistence layer once committed; the
/// transaction identifier is the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub merchant_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub risk_score: f64,
    pub is_fraud: bool,
    pub fraud_reasons: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

impl ScoredTransaction {
    /// Build the output record from a transaction and its scoring result
    pub fn from_parts(
        transaction: &Transaction,
        scoring: &ScoringResult,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction.transaction_id.clone(),
            customer_id: transaction.customer_id.clone(),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            merchant_id: transaction.merchant_id.clone(),
            timestamp: transaction.timestamp,
            risk_score: scoring.risk_score,
            is_fraud: scoring.is_fraud,
            fraud_reasons: scoring.triggered.clone(),
            processed_at,
        }
    }
}
