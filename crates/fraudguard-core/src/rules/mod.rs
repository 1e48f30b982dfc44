//! Fraud rule definitions
//!
//! Rules are configuration, not code: a [`RuleSet`] is an enumerable list of
//! [`RuleSpec`]s, each pairing a weight with a parameterized [`RuleKind`].
//! The scoring aggregation never branches on individual rules, so tuning a
//! weight or adding a rule kind leaves the aggregation untouched. The whole
//! structure round-trips through serde and can be overridden from a config
//! file without code changes.

pub mod engine;

pub use engine::RuleEngine;

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FRAUD_THRESHOLD: f64 = 0.8;

fn default_fraud_threshold() -> f64 {
    DEFAULT_FRAUD_THRESHOLD
}

fn default_velocity_threshold() -> u32 {
    5
}

fn default_velocity_window_secs() -> i64 {
    3600
}

fn default_amount_multiplier() -> f64 {
    3.0
}

fn default_distance_miles() -> f64 {
    500.0
}

fn default_max_speed_mph() -> f64 {
    600.0
}

fn default_start_hour() -> u32 {
    6
}

fn default_end_hour() -> u32 {
    22
}

/// Trigger predicate and parameters for one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Burst of transactions within a trailing window
    Velocity {
        /// Transaction count (including the incoming one) that triggers
        #[serde(default = "default_velocity_threshold")]
        threshold: u32,

        /// Trailing window length in seconds
        #[serde(default = "default_velocity_window_secs")]
        window_secs: i64,
    },

    /// Amount far above the customer's running mean
    AmountAnomaly {
        #[serde(default = "default_amount_multiplier")]
        multiplier: f64,
    },

    /// Implausible travel since the last known location
    LocationAnomaly {
        /// Distance in miles below which the rule never triggers
        #[serde(default = "default_distance_miles")]
        distance_miles: f64,

        /// Highest travel speed considered plausible, in mph
        #[serde(default = "default_max_speed_mph")]
        max_speed_mph: f64,
    },

    /// Transaction outside the customer's normal local hours
    TimeAnomaly {
        /// First normal hour, inclusive
        #[serde(default = "default_start_hour")]
        start_hour: u32,

        /// First abnormal hour after the normal range
        #[serde(default = "default_end_hour")]
        end_hour: u32,
    },
}

/// One configured rule: a name, a score weight, and its trigger parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub weight: f64,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl RuleSpec {
    pub fn new(name: impl Into<String>, weight: f64, kind: RuleKind) -> Self {
        Self {
            name: name.into(),
            weight,
            kind,
        }
    }
}

/// The full scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Scores strictly above this value flag the transaction as fraud
    #[serde(default = "default_fraud_threshold")]
    pub fraud_threshold: f64,

    #[serde(default = "RuleSet::standard_rules")]
    pub rules: Vec<RuleSpec>,
}

impl RuleSet {
    /// The standard rule set with default weights and parameters
    pub fn standard() -> Self {
        Self {
            fraud_threshold: DEFAULT_FRAUD_THRESHOLD,
            rules: Self::standard_rules(),
        }
    }

    /// An empty rule set; every transaction scores zero
    pub fn empty() -> Self {
        Self {
            fraud_threshold: DEFAULT_FRAUD_THRESHOLD,
            rules: Vec::new(),
        }
    }

    fn standard_rules() -> Vec<RuleSpec> {
        vec![
            RuleSpec::new(
                "velocity",
                0.4,
                RuleKind::Velocity {
                    threshold: default_velocity_threshold(),
                    window_secs: default_velocity_window_secs(),
                },
            ),
            RuleSpec::new(
                "amount_anomaly",
                0.3,
                RuleKind::AmountAnomaly {
                    multiplier: default_amount_multiplier(),
                },
            ),
            RuleSpec::new(
                "location_anomaly",
                0.2,
                RuleKind::LocationAnomaly {
                    distance_miles: default_distance_miles(),
                    max_speed_mph: default_max_speed_mph(),
                },
            ),
            RuleSpec::new(
                "time_anomaly",
                0.1,
                RuleKind::TimeAnomaly {
                    start_hour: default_start_hour(),
                    end_hour: default_end_hour(),
                },
            ),
        ]
    }

    /// Override the fraud threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.fraud_threshold = threshold;
        self
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }

    /// Check that thresholds and parameters are usable
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fraud_threshold) {
            return Err(CoreError::InvalidRule(format!(
                "fraud_threshold must be in [0, 1], got {}",
                self.fraud_threshold
            )));
        }

        for rule in &self.rules {
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(CoreError::InvalidRule(format!(
                    "weight for rule '{}' must be in [0, 1], got {}",
                    rule.name, rule.weight
                )));
            }
            match &rule.kind {
                RuleKind::Velocity {
                    threshold,
                    window_secs,
                } => {
                    if *threshold == 0 || *window_secs <= 0 {
                        return Err(CoreError::InvalidRule(format!(
                            "rule '{}' needs a positive threshold and window",
                            rule.name
                        )));
                    }
                }
                RuleKind::AmountAnomaly { multiplier } => {
                    if *multiplier <= 0.0 {
                        return Err(CoreError::InvalidRule(format!(
                            "rule '{}' needs a positive multiplier",
                            rule.name
                        )));
                    }
                }
                RuleKind::LocationAnomaly {
                    distance_miles,
                    max_speed_mph,
                } => {
                    if *distance_miles <= 0.0 || *max_speed_mph <= 0.0 {
                        return Err(CoreError::InvalidRule(format!(
                            "rule '{}' needs positive distance and speed bounds",
                            rule.name
                        )));
                    }
                }
                RuleKind::TimeAnomaly {
                    start_hour,
                    end_hour,
                } => {
                    if *start_hour >= *end_hour || *end_hour > 24 {
                        return Err(CoreError::InvalidRule(format!(
                            "rule '{}' needs 0 <= start_hour < end_hour <= 24",
                            rule.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rule_set() {
        let rules = RuleSet::standard();
        assert_eq!(rules.fraud_threshold, 0.8);
        assert_eq!(rules.rules.len(), 4);
        assert!(rules.validate().is_ok());

        let names: Vec<&str> = rules.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "velocity",
                "amount_anomaly",
                "location_anomaly",
                "time_anomaly"
            ]
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let rules = RuleSet::standard();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(rules, parsed);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        // Omitted parameters fall back to their defaults
        let rules: RuleSet = serde_json::from_str(
            r#"{"rules": [{"name": "velocity", "weight": 0.5, "type": "velocity"}]}"#,
        )
        .unwrap();

        assert_eq!(rules.fraud_threshold, 0.8);
        assert_eq!(rules.rules.len(), 1);
        assert_eq!(
            rules.rules[0].kind,
            RuleKind::Velocity {
                threshold: 5,
                window_secs: 3600
            }
        );
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let rules = RuleSet::standard().with_threshold(1.5);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let rules = RuleSet::empty().with_rule(RuleSpec::new(
            "velocity",
            -0.1,
            RuleKind::Velocity {
                threshold: 5,
                window_secs: 3600,
            },
        ));
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_invalid_hours_rejected() {
        let rules = RuleSet::empty().with_rule(RuleSpec::new(
            "time_anomaly",
            0.1,
            RuleKind::TimeAnomaly {
                start_hour: 22,
                end_hour: 6,
            },
        ));
        assert!(rules.validate().is_err());
    }
}
