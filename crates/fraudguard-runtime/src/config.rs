//! Pipeline configuration
//!
//! Every knob has a serde default, so a config file only needs to name what
//! it overrides. Rule weights, thresholds and per-rule parameters come from
//! the embedded [`RuleSet`] and need no code changes to tune.

use crate::error::{Result, RuntimeError};
use crate::retry::RetryPolicy;
use fraudguard_core::profile::WindowConfig;
use fraudguard_core::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_max_conflict_retries() -> u32 {
    5
}

fn default_archive_attempts() -> u32 {
    3
}

fn default_batch_size() -> usize {
    100
}

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Scoring rules, weights and the fraud threshold
    #[serde(default)]
    pub rules: RuleSet,

    /// Backoff policy for transient failures
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Bounds for per-customer activity windows
    #[serde(default)]
    pub window: WindowConfig,

    /// Deadline for each individual store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Attempts for the optimistic profile-update loop
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Attempts for the best-effort archive append
    #[serde(default = "default_archive_attempts")]
    pub archive_attempts: u32,

    /// Records fetched per partition batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl ProcessorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML configuration document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| RuntimeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RuntimeError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Replace the rule set
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the window bounds
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Set the per-call store deadline
    pub fn with_store_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.store_timeout_ms = timeout_ms;
        self
    }

    /// Set the partition batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Per-call store deadline as a [`Duration`]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Check the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        self.rules
            .validate()
            .map_err(|e| RuntimeError::Config(e.to_string()))?;

        if self.store_timeout_ms == 0 {
            return Err(RuntimeError::Config(
                "store_timeout_ms must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RuntimeError::Config(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RuntimeError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_conflict_retries == 0 {
            return Err(RuntimeError::Config(
                "max_conflict_retries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            rules: RuleSet::default(),
            retry: RetryPolicy::default(),
            window: WindowConfig::default(),
            store_timeout_ms: default_store_timeout_ms(),
            max_conflict_retries: default_max_conflict_retries(),
            archive_attempts: default_archive_attempts(),
            batch_size: default_batch_size(),
        }
    }
}
