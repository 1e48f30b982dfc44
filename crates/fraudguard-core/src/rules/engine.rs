//! Rule evaluation and score aggregation
//!
//! The engine is a pure function of its inputs: the transaction, a profile
//! snapshot, an activity-window snapshot, and the rule set. It reads no
//! clock beyond the transaction's own timestamp and uses no randomness, so
//! identical inputs always produce identical output.

use super::{RuleKind, RuleSet};
use crate::geo;
use crate::profile::{ActivityWindow, CustomerProfile};
use crate::types::record::Transaction;
use crate::types::scored::ScoringResult;
use chrono::{Duration, Timelike};

/// Evaluates transactions against a configured rule set
pub struct RuleEngine {
    rules: RuleSet,
}

impl RuleEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Score one transaction against the profile and activity window
    /// snapshots taken before it was applied.
    pub fn evaluate(
        &self,
        transaction: &Transaction,
        profile: Option<&CustomerProfile>,
        window: &ActivityWindow,
    ) -> ScoringResult {
        let mut score = 0.0;
        let mut triggered = Vec::new();

        for rule in &self.rules.rules {
            if triggers(&rule.kind, transaction, profile, window) {
                score += rule.weight;
                triggered.push(rule.name.clone());
            }
        }

        let risk_score = score.clamp(0.0, 1.0);
        ScoringResult {
            risk_score,
            is_fraud: risk_score > self.rules.fraud_threshold,
            triggered,
        }
    }
}

fn triggers(
    kind: &RuleKind,
    transaction: &Transaction,
    profile: Option<&CustomerProfile>,
    window: &ActivityWindow,
) -> bool {
    match kind {
        RuleKind::Velocity {
            threshold,
            window_secs,
        } => {
            let cutoff = transaction.timestamp - Duration::seconds(*window_secs);
            let recent = window.count_between(cutoff, transaction.timestamp);
            // The incoming transaction counts toward the burst
            recent + 1 >= *threshold as usize
        }

        RuleKind::AmountAnomaly { multiplier } => match profile {
            // No baseline to compare against on a customer's first transaction
            Some(p) if p.transaction_count > 0 => {
                transaction.amount > multiplier * p.mean_amount
            }
            _ => false,
        },

        RuleKind::LocationAnomaly {
            distance_miles,
            max_speed_mph,
        } => {
            let current = match transaction.coordinates() {
                Some(c) => c,
                None => return false,
            };
            let (last, last_at) = match profile {
                Some(p) => match (
                    p.last_location.as_ref().and_then(|l| l.coordinates()),
                    p.last_location_at,
                ) {
                    (Some(last), Some(at)) => (last, at),
                    _ => return false,
                },
                None => return false,
            };

            let distance = geo::haversine_miles(current, last);
            if distance <= *distance_miles {
                return false;
            }

            let elapsed_secs = (transaction.timestamp - last_at).num_seconds();
            if elapsed_secs <= 0 {
                // Simultaneous or out-of-order: no travel time at all
                return true;
            }
            let hours = elapsed_secs as f64 / 3600.0;
            distance / hours > *max_speed_mph
        }

        RuleKind::TimeAnomaly {
            start_hour,
            end_hour,
        } => {
            // Hour in the transaction's own UTC offset
            let hour = transaction.timestamp.hour();
            hour < *start_hour || hour >= *end_hour
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{WindowConfig, WindowEntry};
    use crate::rules::RuleSpec;
    use crate::types::record::Location;
    use chrono::{DateTime, FixedOffset};

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn transaction(amount: f64, timestamp: &str) -> Transaction {
        Transaction {
            transaction_id: "txn_incoming".to_string(),
            customer_id: "cust_000001".to_string(),
            account_id: None,
            transaction_type: None,
            amount,
            currency: "USD".to_string(),
            merchant_id: "merch_0001".to_string(),
            merchant_category: "grocery".to_string(),
            location: None,
            payment_method: None,
            card_present: None,
            timestamp: ts(timestamp),
        }
    }

    fn located(mut txn: Transaction, lat: f64, lon: f64) -> Transaction {
        txn.location = Some(Location {
            latitude: Some(lat),
            longitude: Some(lon),
            city: None,
            state: None,
            country: Some("US".to_string()),
        });
        txn
    }

    fn window_with(timestamps: &[&str]) -> ActivityWindow {
        let mut window = ActivityWindow::new(WindowConfig::default());
        for (i, timestamp) in timestamps.iter().enumerate() {
            window.push(WindowEntry {
                timestamp: ts(timestamp),
                amount: 10.0,
                transaction_id: format!("txn_{}", i),
            });
        }
        window
    }

    fn profile_with_mean(mean: f64, count: u64) -> CustomerProfile {
        let mut profile = CustomerProfile::new("cust_000001");
        profile.transaction_count = count;
        profile.mean_amount = mean;
        profile
    }

    #[test]
    fn test_velocity_triggers_at_threshold() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = window_with(&[
            "2024-03-15T11:10:00Z",
            "2024-03-15T11:20:00Z",
            "2024-03-15T11:30:00Z",
            "2024-03-15T11:40:00Z",
        ]);
        let txn = transaction(10.0, "2024-03-15T12:00:00Z");

        let result = engine.evaluate(&txn, None, &window);
        assert!(result.triggered.contains(&"velocity".to_string()));
    }

    #[test]
    fn test_velocity_ignores_entries_outside_window() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = window_with(&[
            "2024-03-15T08:10:00Z",
            "2024-03-15T08:20:00Z",
            "2024-03-15T08:30:00Z",
            "2024-03-15T08:40:00Z",
        ]);
        let txn = transaction(10.0, "2024-03-15T12:00:00Z");

        let result = engine.evaluate(&txn, None, &window);
        assert!(!result.triggered.contains(&"velocity".to_string()));
    }

    #[test]
    fn test_amount_anomaly_strict_inequality() {
        let engine = RuleEngine::new(RuleSet::standard());
        let profile = profile_with_mean(100.0, 10);
        let window = ActivityWindow::new(WindowConfig::default());

        let over = engine.evaluate(
            &transaction(301.0, "2024-03-15T12:00:00Z"),
            Some(&profile),
            &window,
        );
        assert!(over.triggered.contains(&"amount_anomaly".to_string()));

        let at = engine.evaluate(
            &transaction(300.0, "2024-03-15T12:00:00Z"),
            Some(&profile),
            &window,
        );
        assert!(!at.triggered.contains(&"amount_anomaly".to_string()));
    }

    #[test]
    fn test_amount_anomaly_skipped_without_baseline() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());

        let result = engine.evaluate(
            &transaction(1_000_000.0, "2024-03-15T12:00:00Z"),
            None,
            &window,
        );
        assert!(!result.triggered.contains(&"amount_anomaly".to_string()));

        let empty_profile = profile_with_mean(0.0, 0);
        let result = engine.evaluate(
            &transaction(1_000_000.0, "2024-03-15T12:00:00Z"),
            Some(&empty_profile),
            &window,
        );
        assert!(!result.triggered.contains(&"amount_anomaly".to_string()));
    }

    #[test]
    fn test_location_anomaly_implausible_travel() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());

        // Last seen in New York one hour ago, now in Los Angeles
        let mut profile = profile_with_mean(100.0, 10);
        profile.last_location = Some(Location {
            latitude: Some(40.7128),
            longitude: Some(-74.0060),
            city: None,
            state: None,
            country: Some("US".to_string()),
        });
        profile.last_location_at = Some(ts("2024-03-15T11:00:00Z"));

        let txn = located(
            transaction(50.0, "2024-03-15T12:00:00Z"),
            34.0522,
            -118.2437,
        );
        let result = engine.evaluate(&txn, Some(&profile), &window);
        assert!(result.triggered.contains(&"location_anomaly".to_string()));
    }

    #[test]
    fn test_location_anomaly_plausible_travel() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());

        // Same coast-to-coast hop, but a week apart
        let mut profile = profile_with_mean(100.0, 10);
        profile.last_location = Some(Location {
            latitude: Some(40.7128),
            longitude: Some(-74.0060),
            city: None,
            state: None,
            country: Some("US".to_string()),
        });
        profile.last_location_at = Some(ts("2024-03-08T12:00:00Z"));

        let txn = located(
            transaction(50.0, "2024-03-15T12:00:00Z"),
            34.0522,
            -118.2437,
        );
        let result = engine.evaluate(&txn, Some(&profile), &window);
        assert!(!result.triggered.contains(&"location_anomaly".to_string()));
    }

    #[test]
    fn test_location_anomaly_skipped_without_coordinates() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());
        let profile = profile_with_mean(100.0, 10);

        let txn = transaction(50.0, "2024-03-15T12:00:00Z");
        let result = engine.evaluate(&txn, Some(&profile), &window);
        assert!(!result.triggered.contains(&"location_anomaly".to_string()));
    }

    #[test]
    fn test_time_anomaly_late_night() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());

        let late = engine.evaluate(&transaction(10.0, "2024-03-15T23:30:00Z"), None, &window);
        assert!(late.triggered.contains(&"time_anomaly".to_string()));

        let daytime = engine.evaluate(&transaction(10.0, "2024-03-15T12:00:00Z"), None, &window);
        assert!(!daytime.triggered.contains(&"time_anomaly".to_string()));
    }

    #[test]
    fn test_time_anomaly_uses_local_offset() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());

        // 22:00 UTC, but 03:00 in the transaction's own offset
        let txn = transaction(10.0, "2024-03-16T03:00:00+05:00");
        let result = engine.evaluate(&txn, None, &window);
        assert!(result.triggered.contains(&"time_anomaly".to_string()));
    }

    #[test]
    fn test_score_aggregation() {
        let engine = RuleEngine::new(RuleSet::standard());
        // Four prior transactions in the hour before a late-night one:
        // velocity (0.4) and time_anomaly (0.1) both trigger
        let window = window_with(&[
            "2024-03-15T22:40:00Z",
            "2024-03-15T22:50:00Z",
            "2024-03-15T23:00:00Z",
            "2024-03-15T23:10:00Z",
        ]);
        let txn = transaction(10.0, "2024-03-15T23:30:00Z");

        let result = engine.evaluate(&txn, None, &window);
        assert_eq!(
            result.triggered,
            vec!["velocity".to_string(), "time_anomaly".to_string()]
        );
        assert_eq!(result.risk_score, 0.5);
        assert!(!result.is_fraud);
    }

    #[test]
    fn test_score_clamped_to_one() {
        let heavy = RuleSet::empty()
            .with_rule(RuleSpec::new(
                "night_a",
                0.9,
                RuleKind::TimeAnomaly {
                    start_hour: 6,
                    end_hour: 22,
                },
            ))
            .with_rule(RuleSpec::new(
                "night_b",
                0.9,
                RuleKind::TimeAnomaly {
                    start_hour: 8,
                    end_hour: 20,
                },
            ));
        let engine = RuleEngine::new(heavy);
        let window = ActivityWindow::new(WindowConfig::default());

        let result = engine.evaluate(&transaction(10.0, "2024-03-15T23:30:00Z"), None, &window);
        assert_eq!(result.risk_score, 1.0);
        assert!(result.is_fraud);
    }

    #[test]
    fn test_fraud_flag_is_strictly_above_threshold() {
        let rules = RuleSet::empty().with_threshold(0.1).with_rule(RuleSpec::new(
            "time_anomaly",
            0.1,
            RuleKind::TimeAnomaly {
                start_hour: 6,
                end_hour: 22,
            },
        ));
        let engine = RuleEngine::new(rules);
        let window = ActivityWindow::new(WindowConfig::default());

        let result = engine.evaluate(&transaction(10.0, "2024-03-15T23:30:00Z"), None, &window);
        assert_eq!(result.risk_score, 0.1);
        assert!(!result.is_fraud);
    }

    #[test]
    fn test_first_transaction_scores_zero() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = ActivityWindow::new(WindowConfig::default());

        let result = engine.evaluate(&transaction(50.0, "2024-03-15T12:00:00Z"), None, &window);
        assert_eq!(result.risk_score, 0.0);
        assert!(result.triggered.is_empty());
        assert!(!result.is_fraud);
    }

    #[test]
    fn test_deterministic_output() {
        let engine = RuleEngine::new(RuleSet::standard());
        let window = window_with(&["2024-03-15T11:30:00Z", "2024-03-15T11:45:00Z"]);
        let profile = profile_with_mean(100.0, 5);
        let txn = transaction(350.0, "2024-03-15T23:30:00Z");

        let first = engine.evaluate(&txn, Some(&profile), &window);
        let second = engine.evaluate(&txn, Some(&profile), &window);
        assert_eq!(first, second);
    }
}
