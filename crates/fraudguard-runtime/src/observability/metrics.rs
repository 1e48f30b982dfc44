//! Metrics collection and reporting

use serde::Serialize;
use std::sync::RwLock;

/// Counter metric
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: RwLock<u64>,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: RwLock::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Increment the counter
    pub fn inc(&self) {
        self.add(1);
    }

    /// Add a value to the counter
    pub fn add(&self, value: u64) {
        *self.value.write().unwrap() += value;
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        *self.value.read().unwrap()
    }
}

/// Histogram metric for tracking distributions
#[derive(Debug)]
pub struct Histogram {
    name: String,
    values: RwLock<Vec<f64>>,
}

impl Histogram {
    /// Create a new histogram
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observe a value
    pub fn observe(&self, value: f64) {
        self.values.write().unwrap().push(value);
    }

    /// Get count of observations
    pub fn count(&self) -> usize {
        self.values.read().unwrap().len()
    }

    /// Get average value
    pub fn avg(&self) -> f64 {
        let values = self.values.read().unwrap();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Get percentile (0-100)
    pub fn percentile(&self, p: f64) -> f64 {
        let mut values = self.values.read().unwrap().clone();
        if values.is_empty() {
            return 0.0;
        }

        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let index = ((p / 100.0) * (values.len() - 1) as f64).round() as usize;
        values[index]
    }
}

/// Counters and latency for the whole pipeline
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Transactions scored and stored for the first time
    pub processed: Counter,

    /// Redelivered records detected at the idempotency gate
    pub duplicates: Counter,

    /// Stored transactions flagged as fraud
    pub fraud_detected: Counter,

    /// Records rejected by input validation
    pub validation_failures: Counter,

    /// Records routed to the dead-letter sink
    pub dead_lettered: Counter,

    /// Transient-failure retries
    pub retries: Counter,

    /// Optimistic-concurrency conflicts on profile updates
    pub conflicts: Counter,

    /// Per-record processing latency in seconds
    pub processing_seconds: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            processed: Counter::new("processed_transactions"),
            duplicates: Counter::new("duplicate_transactions"),
            fraud_detected: Counter::new("fraud_detected"),
            validation_failures: Counter::new("validation_failures"),
            dead_lettered: Counter::new("dead_lettered"),
            retries: Counter::new("retries"),
            conflicts: Counter::new("profile_conflicts"),
            processing_seconds: Histogram::new("processing_seconds"),
        }
    }

    /// Point-in-time view of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed.get(),
            duplicates: self.duplicates.get(),
            fraud_detected: self.fraud_detected.get(),
            validation_failures: self.validation_failures.get(),
            dead_lettered: self.dead_lettered.get(),
            retries: self.retries.get(),
            conflicts: self.conflicts.get(),
            avg_processing_seconds: self.processing_seconds.avg(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-number view of [`PipelineMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub duplicates: u64,
    pub fraud_detected: u64,
    pub validation_failures: u64,
    pub dead_lettered: u64,
    pub retries: u64,
    pub conflicts: u64,
    pub avg_processing_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("processed");
        assert_eq!(counter.get(), 0);

        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
        assert_eq!(counter.name(), "processed");
    }

    #[test]
    fn test_histogram_avg() {
        let histogram = Histogram::new("latency");
        assert_eq!(histogram.avg(), 0.0);

        histogram.observe(1.0);
        histogram.observe(3.0);
        assert_eq!(histogram.count(), 2);
        assert_eq!(histogram.avg(), 2.0);
    }

    #[test]
    fn test_histogram_percentile() {
        let histogram = Histogram::new("latency");
        for value in [5.0, 1.0, 3.0, 2.0, 4.0] {
            histogram.observe(value);
        }

        assert_eq!(histogram.percentile(50.0), 3.0);
        assert_eq!(histogram.percentile(100.0), 5.0);
    }

    #[test]
    fn test_snapshot() {
        let metrics = PipelineMetrics::new();
        metrics.processed.add(3);
        metrics.duplicates.inc();
        metrics.processing_seconds.observe(0.5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.duplicates, 1);
        assert_eq!(snapshot.avg_processing_seconds, 0.5);
    }
}
