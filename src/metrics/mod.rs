//! Performance Metrics Module
//!
//! Collects start/end timing of named operations, resource usage counters
//! and process CPU/memory samples.

mod collector;
mod records;
mod system;

pub use collector::{AggregationReport, MetricsCollector, WeakMetricsCollector};
pub(crate) use records::OpenOperation;
pub use records::{
    MetricsSnapshot, MetricsSummary, OperationRecord, OperationSummary, OperationTotals,
    OperationsSnapshot, ResourceAttributes, ResourceCounters, TypeSummary, EVENT_HIT, EVENT_MISS,
    EVENT_QUERY,
};
pub use system::{SystemMetrics, SystemSampler};
