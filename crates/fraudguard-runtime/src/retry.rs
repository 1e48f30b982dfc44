//! Retry policy with exponential backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Randomize each delay into [delay/2, delay] to spread retry storms
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl RetryPolicy {
    /// Delay before the retry following attempt number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay =
            (self.initial_delay_ms as f64 * self.backoff_factor.powi(attempt as i32)) as u64;
        let capped = delay.min(self.max_delay_ms);

        let millis = if self.jitter && capped > 0 {
            use rand::Rng;
            rand::thread_rng().gen_range(capped / 2..=capped)
        } else {
            capped
        };

        Duration::from_millis(millis)
    }

    /// Policy that never waits; used in tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_factor: 1.0,
            jitter: false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter: default_jitter(),
        }
    }
}
