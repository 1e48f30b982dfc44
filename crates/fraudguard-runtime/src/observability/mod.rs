//! Observability for the scoring pipeline

pub mod metrics;

pub use metrics::{Counter, Histogram, MetricsSnapshot, PipelineMetrics};
