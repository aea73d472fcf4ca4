//! Metrics Records Module
//!
//! Operation records, resource counters and the snapshot types returned by
//! the collector.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::metrics::SystemMetrics;

/// Event kinds with dedicated counters.
pub const EVENT_QUERY: &str = "query";
pub const EVENT_HIT: &str = "hit";
pub const EVENT_MISS: &str = "miss";

// == Open Operation ==
/// An operation started but not yet ended.
#[derive(Debug, Clone)]
pub(crate) struct OpenOperation {
    pub operation_type: String,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl OpenOperation {
    pub fn new(operation_type: &str) -> Self {
        Self {
            operation_type: operation_type.to_string(),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

// == Operation Record ==
/// A closed operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    pub operation_id: String,
    pub operation_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(skip)]
    pub duration: Duration,
    pub metadata: Option<Value>,
    #[serde(skip)]
    pub(crate) ended: Option<Instant>,
}

impl OperationRecord {
    pub(crate) fn close(
        operation_id: String,
        open: OpenOperation,
        success: bool,
        metadata: Option<Value>,
    ) -> Self {
        let ended = Instant::now();
        let duration = ended.saturating_duration_since(open.started);
        Self {
            operation_id,
            operation_type: open.operation_type,
            started_at: open.started_at,
            ended_at: Utc::now(),
            success,
            duration_ms: duration.as_secs_f64() * 1000.0,
            duration,
            metadata,
            ended: Some(ended),
        }
    }
}

// == Operation Totals ==
/// Cumulative counts; unaffected by record retention.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationTotals {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// `end_operation` calls for ids that were not open
    pub anomalies: u64,
    /// Open operations dropped by the retention sweep
    pub abandoned: u64,
}

impl OperationTotals {
    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    /// failed / total, 0 when nothing completed.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }
}

/// Per-operation-type aggregate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeSummary {
    pub count: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_duration_ms: f64,
    pub avg_duration_ms: f64,
}

impl TypeSummary {
    pub fn record(&mut self, record: &OperationRecord) {
        self.count += 1;
        if record.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.total_duration_ms += record.duration_ms;
        self.avg_duration_ms = self.total_duration_ms / self.count as f64;
    }
}

// == Resource Usage ==
/// Optional details attached to a resource usage event.
#[derive(Debug, Clone, Default)]
pub struct ResourceAttributes {
    pub duration: Option<Duration>,
    pub slow: bool,
}

impl ResourceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn slow(mut self, slow: bool) -> Self {
        self.slow = slow;
        self
    }
}

/// Cumulative counters for one resource category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceCounters {
    /// Count per event kind
    pub events: BTreeMap<String, u64>,
    pub queries: u64,
    pub slow_queries: u64,
    pub slow_events: u64,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0 with neither
    pub hit_rate: f64,
    pub total_duration_ms: f64,
}

impl ResourceCounters {
    pub fn record(&mut self, event_kind: &str, attributes: &ResourceAttributes) {
        *self.events.entry(event_kind.to_string()).or_insert(0) += 1;

        match event_kind {
            EVENT_QUERY => {
                self.queries += 1;
                if attributes.slow {
                    self.slow_queries += 1;
                }
            }
            EVENT_HIT => self.hits += 1,
            EVENT_MISS => self.misses += 1,
            _ => {}
        }

        if attributes.slow {
            self.slow_events += 1;
        }
        if let Some(duration) = attributes.duration {
            self.total_duration_ms += duration.as_secs_f64() * 1000.0;
        }

        let lookups = self.hits + self.misses;
        if lookups > 0 {
            self.hit_rate = self.hits as f64 / lookups as f64;
        }
    }
}

// == Snapshots ==
/// Operation section of the full metrics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OperationsSnapshot {
    pub active: usize,
    pub totals: OperationTotals,
    pub error_rate: f64,
    /// Newest completed records inside the retention window, oldest first,
    /// at most `max_recent_records` of them
    pub recent: Vec<OperationRecord>,
    pub by_type: BTreeMap<String, TypeSummary>,
}

impl OperationsSnapshot {
    pub(crate) fn build(
        active: usize,
        totals: &OperationTotals,
        completed: &VecDeque<OperationRecord>,
        max_recent: usize,
        by_type: &BTreeMap<String, TypeSummary>,
    ) -> Self {
        let skip = completed.len().saturating_sub(max_recent);
        Self {
            active,
            error_rate: totals.error_rate(),
            totals: totals.clone(),
            recent: completed.iter().skip(skip).cloned().collect(),
            by_type: by_type.clone(),
        }
    }
}

/// Full collector state.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub operations: OperationsSnapshot,
    pub resources: BTreeMap<String, ResourceCounters>,
    pub system: SystemMetrics,
}

/// Condensed operation counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub error_rate: f64,
}

/// Condensed collector view.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub operations: OperationSummary,
    pub system: SystemMetrics,
}
