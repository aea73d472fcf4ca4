//! Performance Metrics Collector
//!
//! Tracks named operations and resource usage events.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MetricsConfig;
use crate::error::TrackingError;
use crate::metrics::{
    MetricsSnapshot, MetricsSummary, OpenOperation, OperationRecord, OperationSummary,
    OperationTotals, OperationsSnapshot, ResourceAttributes, ResourceCounters, SystemMetrics,
    SystemSampler, TypeSummary,
};
use crate::tasks::spawn_aggregation_task;

#[derive(Debug, Default)]
struct CollectorState {
    open: HashMap<String, OpenOperation>,
    /// Closed records inside the retention window, oldest first
    completed: VecDeque<OperationRecord>,
    totals: OperationTotals,
    by_type: BTreeMap<String, TypeSummary>,
    resources: BTreeMap<String, ResourceCounters>,
    sampler: SystemSampler,
}

struct CollectorInner {
    config: MetricsConfig,
    state: Mutex<CollectorState>,
    aggregation: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl Drop for CollectorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.aggregation.get_mut().take() {
            handle.abort();
        }
    }
}

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub pruned_records: usize,
    pub abandoned_operations: usize,
}

// == Metrics Collector ==
/// Cloneable handle to the operation and resource metrics collector.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<CollectorInner>,
}

/// Non-owning reference held by the aggregation task.
pub struct WeakMetricsCollector {
    inner: Weak<CollectorInner>,
}

impl WeakMetricsCollector {
    pub fn upgrade(&self) -> Option<MetricsCollector> {
        self.inner.upgrade().map(|inner| MetricsCollector { inner })
    }
}

impl MetricsCollector {
    /// Creates a collector; the aggregation task starts when a tokio runtime
    /// is available and `aggregation_interval` is non-zero.
    pub fn new(config: MetricsConfig) -> Self {
        let interval = config.aggregation_interval;
        let collector = Self {
            inner: Arc::new(CollectorInner {
                config,
                state: Mutex::new(CollectorState::default()),
                aggregation: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        };

        if !interval.is_zero() {
            if tokio::runtime::Handle::try_current().is_ok() {
                let handle = spawn_aggregation_task(collector.downgrade(), interval);
                *collector.inner.aggregation.lock() = Some(handle);
            } else {
                warn!("No tokio runtime available, metrics aggregation disabled");
            }
        }

        collector
    }

    pub fn downgrade(&self) -> WeakMetricsCollector {
        WeakMetricsCollector {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.inner.config
    }

    // == Operations ==
    /// Opens an operation record.
    ///
    /// Fails if an operation with the same id is still open. A no-op when
    /// operation tracking is disabled.
    pub fn start_operation(&self, operation_id: &str, operation_type: &str) -> Result<(), TrackingError> {
        if self.is_destroyed() {
            return Err(TrackingError::Destroyed);
        }
        if !self.inner.config.enable_operation_tracking {
            return Ok(());
        }

        let mut state = self.inner.state.lock();
        if state.open.contains_key(operation_id) {
            warn!("Operation {} already open", operation_id);
            return Err(TrackingError::DuplicateOperation(operation_id.to_string()));
        }
        state
            .open
            .insert(operation_id.to_string(), OpenOperation::new(operation_type));
        debug!("Operation {} ({}) started", operation_id, operation_type);
        Ok(())
    }

    /// Closes an operation and returns its record.
    ///
    /// Unknown or already-closed ids return `None`; they are logged and
    /// counted in `totals.anomalies`.
    pub fn end_operation(
        &self,
        operation_id: &str,
        success: bool,
        metadata: Option<Value>,
    ) -> Option<OperationRecord> {
        if self.is_destroyed() || !self.inner.config.enable_operation_tracking {
            return None;
        }

        let mut state = self.inner.state.lock();
        let Some(open) = state.open.remove(operation_id) else {
            state.totals.anomalies += 1;
            warn!("end_operation for unknown operation {}", operation_id);
            return None;
        };

        let record = OperationRecord::close(operation_id.to_string(), open, success, metadata);
        state.totals.record(success);
        state
            .by_type
            .entry(record.operation_type.clone())
            .or_default()
            .record(&record);
        state.completed.push_back(record.clone());

        debug!(
            "Operation {} ({}) finished in {:.2}ms, success={}",
            operation_id, record.operation_type, record.duration_ms, success
        );
        Some(record)
    }

    pub fn active_operations(&self) -> usize {
        self.inner.state.lock().open.len()
    }

    // == Resources ==
    /// Updates the counters of a resource category.
    ///
    /// `"query"`, `"hit"` and `"miss"` events feed the dedicated query and
    /// hit-rate counters; `attributes.slow` feeds the slow counters.
    pub fn record_resource_usage(&self, category: &str, event_kind: &str, attributes: ResourceAttributes) {
        if self.is_destroyed() || !self.inner.config.enable_resource_tracking {
            return;
        }

        let mut state = self.inner.state.lock();
        state
            .resources
            .entry(category.to_string())
            .or_default()
            .record(event_kind, &attributes);

        if attributes.slow {
            debug!("Slow {} {} recorded ({:?})", category, event_kind, attributes.duration);
        }
    }

    // == Snapshots ==
    /// Full snapshot of operations, resources and system usage.
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut state = self.inner.state.lock();
        let system = self.system_metrics(&mut state);
        MetricsSnapshot {
            operations: OperationsSnapshot::build(
                state.open.len(),
                &state.totals,
                &state.completed,
                self.inner.config.max_recent_records,
                &state.by_type,
            ),
            resources: state.resources.clone(),
            system,
        }
    }

    /// Condensed view: operation outcome counts and system usage.
    pub fn summary(&self) -> MetricsSummary {
        let mut state = self.inner.state.lock();
        let system = self.system_metrics(&mut state);
        let totals = &state.totals;
        MetricsSummary {
            operations: OperationSummary {
                total: totals.total,
                successful: totals.successful,
                failed: totals.failed,
                error_rate: totals.error_rate(),
            },
            system,
        }
    }

    // == Aggregation ==
    /// Prunes records older than the retention window, drops operations
    /// left open longer than it, and samples system usage.
    pub fn aggregate(&self) -> AggregationReport {
        let retention = self.inner.config.metrics_retention;
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        let before = state.completed.len();
        state
            .completed
            .retain(|record| within(record.ended, now, retention));
        let pruned_records = before - state.completed.len();

        let before = state.open.len();
        state
            .open
            .retain(|_, open| now.saturating_duration_since(open.started) < retention);
        let abandoned_operations = before - state.open.len();
        state.totals.abandoned += abandoned_operations as u64;

        if abandoned_operations > 0 {
            warn!("Dropped {} operations never ended", abandoned_operations);
        }
        if self.inner.config.enable_system_metrics {
            state.sampler.sample();
        }

        AggregationReport {
            pruned_records,
            abandoned_operations,
        }
    }

    // == Destroy ==
    /// Stops the aggregation task and discards open operations.
    ///
    /// Idempotent. Afterwards `start_operation` fails with
    /// [`TrackingError::Destroyed`] and other recording calls are no-ops.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = self.inner.aggregation.lock().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.inner.state.lock().open.clear();
        info!("Metrics collector destroyed");
    }

    fn system_metrics(&self, state: &mut CollectorState) -> SystemMetrics {
        if self.inner.config.enable_system_metrics {
            state.sampler.sample()
        } else {
            SystemMetrics::default()
        }
    }
}

fn within(ended: Option<Instant>, now: Instant, retention: Duration) -> bool {
    ended.is_some_and(|ended| now.saturating_duration_since(ended) < retention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    fn test_config() -> MetricsConfig {
        MetricsConfig {
            enable_system_metrics: false,
            aggregation_interval: Duration::ZERO,
            ..MetricsConfig::default()
        }
    }

    #[test]
    fn test_start_end_operation_records_duration() {
        let collector = MetricsCollector::new(test_config());

        collector.start_operation("req-1", "model_load").unwrap();
        sleep(Duration::from_millis(30));
        let record = collector
            .end_operation("req-1", true, Some(json!({"rows": 3})))
            .unwrap();

        assert_eq!(record.operation_type, "model_load");
        assert!(record.success);
        assert!(record.duration >= Duration::from_millis(30));
        assert!(record.duration < Duration::from_millis(500));
        assert!((record.duration_ms - record.duration.as_secs_f64() * 1000.0).abs() < 1e-6);
        assert_eq!(record.metadata, Some(json!({"rows": 3})));
        assert_eq!(collector.active_operations(), 0);
    }

    #[test]
    fn test_duplicate_start_is_error() {
        let collector = MetricsCollector::new(test_config());

        collector.start_operation("req-1", "query").unwrap();
        assert_eq!(
            collector.start_operation("req-1", "query"),
            Err(TrackingError::DuplicateOperation("req-1".to_string()))
        );
        assert_eq!(collector.active_operations(), 1);
    }

    #[test]
    fn test_unknown_and_double_end_are_anomalies() {
        let collector = MetricsCollector::new(test_config());

        assert!(collector.end_operation("ghost", true, None).is_none());

        collector.start_operation("req-1", "query").unwrap();
        assert!(collector.end_operation("req-1", false, None).is_some());
        assert!(collector.end_operation("req-1", false, None).is_none());

        let snapshot = collector.metrics();
        assert_eq!(snapshot.operations.totals.anomalies, 2);
        assert_eq!(snapshot.operations.totals.total, 1);
        assert_eq!(snapshot.operations.totals.failed, 1);
    }

    #[test]
    fn test_summary_error_rate() {
        let collector = MetricsCollector::new(test_config());
        assert_eq!(collector.summary().operations.error_rate, 0.0);

        for (id, ok) in [("a", true), ("b", true), ("c", false), ("d", true)] {
            collector.start_operation(id, "inference").unwrap();
            collector.end_operation(id, ok, None);
        }

        let summary = collector.summary();
        assert_eq!(
            summary.operations,
            OperationSummary {
                total: 4,
                successful: 3,
                failed: 1,
                error_rate: 0.25,
            }
        );
        assert_eq!(summary.system, SystemMetrics::default());
    }

    #[test]
    fn test_metrics_by_type() {
        let collector = MetricsCollector::new(test_config());
        for id in ["a", "b"] {
            collector.start_operation(id, "load").unwrap();
            collector.end_operation(id, true, None);
        }
        collector.start_operation("c", "save").unwrap();
        collector.end_operation("c", false, None);
        collector.start_operation("d", "save").unwrap();

        let snapshot = collector.metrics();
        assert_eq!(snapshot.operations.active, 1);
        assert_eq!(snapshot.operations.recent.len(), 3);
        assert_eq!(snapshot.operations.by_type["load"].count, 2);
        assert_eq!(snapshot.operations.by_type["save"].failed, 1);
    }

    #[test]
    fn test_metrics_recent_is_capped_to_newest() {
        let collector = MetricsCollector::new(MetricsConfig {
            max_recent_records: 2,
            ..test_config()
        });
        for id in ["a", "b", "c", "d"] {
            collector.start_operation(id, "load").unwrap();
            collector.end_operation(id, true, None);
        }

        let snapshot = collector.metrics();
        let ids: Vec<&str> = snapshot
            .operations
            .recent
            .iter()
            .map(|r| r.operation_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert_eq!(snapshot.operations.totals.total, 4);
        assert_eq!(snapshot.operations.by_type["load"].count, 4);
    }

    #[test]
    fn test_record_resource_usage() {
        let collector = MetricsCollector::new(test_config());

        collector.record_resource_usage("cache", "hit", ResourceAttributes::new());
        collector.record_resource_usage("cache", "miss", ResourceAttributes::new());
        collector.record_resource_usage(
            "database",
            "query",
            ResourceAttributes::new().duration(Duration::from_millis(1200)).slow(true),
        );

        let resources = collector.metrics().resources;
        assert_eq!(resources["cache"].hit_rate, 0.5);
        assert_eq!(resources["database"].queries, 1);
        assert_eq!(resources["database"].slow_queries, 1);
    }

    #[test]
    fn test_disabled_tracking_is_noop() {
        let collector = MetricsCollector::new(MetricsConfig {
            enable_operation_tracking: false,
            enable_resource_tracking: false,
            ..test_config()
        });

        collector.start_operation("a", "load").unwrap();
        assert!(collector.end_operation("a", true, None).is_none());
        collector.record_resource_usage("cache", "hit", ResourceAttributes::new());

        let snapshot = collector.metrics();
        assert_eq!(snapshot.operations.totals.total, 0);
        assert_eq!(snapshot.operations.totals.anomalies, 0);
        assert!(snapshot.resources.is_empty());
    }

    #[test]
    fn test_aggregate_prunes_but_keeps_counters() {
        let collector = MetricsCollector::new(MetricsConfig {
            metrics_retention: Duration::from_millis(40),
            ..test_config()
        });

        collector.start_operation("done", "load").unwrap();
        collector.end_operation("done", true, None);
        collector.start_operation("stuck", "load").unwrap();
        collector.record_resource_usage("cache", "hit", ResourceAttributes::new());

        sleep(Duration::from_millis(60));
        let report = collector.aggregate();

        assert_eq!(
            report,
            AggregationReport {
                pruned_records: 1,
                abandoned_operations: 1,
            }
        );
        let snapshot = collector.metrics();
        assert!(snapshot.operations.recent.is_empty());
        assert_eq!(snapshot.operations.active, 0);
        assert_eq!(snapshot.operations.totals.total, 1);
        assert_eq!(snapshot.operations.totals.abandoned, 1);
        assert_eq!(snapshot.resources["cache"].hits, 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let collector = MetricsCollector::new(test_config());
        collector.start_operation("a", "load").unwrap();

        collector.destroy();
        collector.destroy();

        assert!(collector.is_destroyed());
        assert_eq!(collector.active_operations(), 0);
        assert_eq!(collector.start_operation("b", "load"), Err(TrackingError::Destroyed));
        assert!(collector.end_operation("a", true, None).is_none());
    }

    #[tokio::test]
    async fn test_aggregation_task_stops_on_destroy() {
        let collector = MetricsCollector::new(MetricsConfig {
            aggregation_interval: Duration::from_millis(10),
            ..test_config()
        });
        assert!(collector.inner.aggregation.lock().is_some());

        collector.destroy();
        assert!(collector.inner.aggregation.lock().is_none());
    }
}
