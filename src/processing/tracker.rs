//! Processing Time Tracker
//!
//! Times multi-stage operations, flags slow stages and keeps per-type
//! duration samples for analytics.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::TrackingError;
use crate::processing::{
    ActiveStage, DurationSample, OperationAnalytics, StageBreakdown, StageRecord,
};
use crate::tasks::spawn_retention_task;

/// Upper bound on the retention sweep cadence.
const MAX_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

// == Records ==
/// A stage at or above the slow threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub stage: String,
    pub duration_ms: f64,
    /// Fraction of the whole operation spent in this stage
    pub share: f64,
}

/// Result of `end_operation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedOperation {
    pub operation_id: String,
    pub operation_type: String,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub duration_ms: f64,
    #[serde(skip)]
    pub duration: Duration,
    pub metadata: Option<Value>,
    pub stage_breakdown: StageBreakdown,
    pub bottlenecks: Vec<Bottleneck>,
    /// Whole operation at or above the slow threshold
    pub slow: bool,
    pub suggestions: Vec<String>,
}

/// Tracker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub active_operations: usize,
    pub total_operations: u64,
    pub bottlenecks_detected: u64,
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub pruned_samples: usize,
    pub abandoned_operations: usize,
}

#[derive(Debug)]
struct TrackedOperation {
    operation_type: String,
    started: Instant,
    started_at: DateTime<Utc>,
    stages: Vec<StageRecord>,
    current: Option<ActiveStage>,
}

#[derive(Debug, Default)]
struct TrackerState {
    active: HashMap<String, TrackedOperation>,
    /// Completed durations per operation type, oldest first
    samples: HashMap<String, VecDeque<DurationSample>>,
    total_operations: u64,
    bottlenecks_detected: u64,
}

struct TrackerInner {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
    retention: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        if let Some(handle) = self.retention.get_mut().take() {
            handle.abort();
        }
    }
}

// == Processing Time Tracker ==
/// Cloneable handle to the stage-level processing time tracker.
///
/// Stages are strictly sequential: one stage may be running per operation.
#[derive(Clone)]
pub struct ProcessingTimeTracker {
    inner: Arc<TrackerInner>,
}

/// Non-owning reference held by the retention task.
pub struct WeakProcessingTimeTracker {
    inner: Weak<TrackerInner>,
}

impl WeakProcessingTimeTracker {
    pub fn upgrade(&self) -> Option<ProcessingTimeTracker> {
        self.inner.upgrade().map(|inner| ProcessingTimeTracker { inner })
    }
}

impl ProcessingTimeTracker {
    /// Creates a tracker; inside a tokio runtime a retention sweep runs
    /// every tenth of `tracking_retention`, capped at one minute.
    pub fn new(config: TrackerConfig) -> Self {
        let prune_interval = (config.tracking_retention / 10).min(MAX_PRUNE_INTERVAL);
        let tracker = Self {
            inner: Arc::new(TrackerInner {
                config,
                state: Mutex::new(TrackerState::default()),
                retention: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        };

        if !prune_interval.is_zero() && tokio::runtime::Handle::try_current().is_ok() {
            let handle = spawn_retention_task(tracker.downgrade(), prune_interval);
            *tracker.inner.retention.lock() = Some(handle);
        }

        tracker
    }

    pub fn downgrade(&self) -> WeakProcessingTimeTracker {
        WeakProcessingTimeTracker {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    // == Operations ==
    pub fn start_operation(&self, operation_id: &str, operation_type: &str) -> Result<(), TrackingError> {
        if self.is_destroyed() {
            return Err(TrackingError::Destroyed);
        }

        let mut state = self.inner.state.lock();
        if state.active.contains_key(operation_id) {
            return Err(TrackingError::DuplicateOperation(operation_id.to_string()));
        }
        state.active.insert(
            operation_id.to_string(),
            TrackedOperation {
                operation_type: operation_type.to_string(),
                started: Instant::now(),
                started_at: Utc::now(),
                stages: Vec::new(),
                current: None,
            },
        );
        Ok(())
    }

    /// Closes an operation, analyzing its stages.
    ///
    /// A stage still running is closed at the operation's end.
    pub fn end_operation(
        &self,
        operation_id: &str,
        success: bool,
        metadata: Option<Value>,
    ) -> Result<CompletedOperation, TrackingError> {
        if self.is_destroyed() {
            return Err(TrackingError::Destroyed);
        }

        let mut state = self.inner.state.lock();
        let mut operation = state
            .active
            .remove(operation_id)
            .ok_or_else(|| TrackingError::UnknownOperation(operation_id.to_string()))?;

        let ended = Instant::now();
        if let Some(stage) = operation.current.take() {
            warn!(
                "Stage '{}' still open when operation {} ended",
                stage.name, operation_id
            );
            operation.stages.push(stage.finish(ended));
        }

        let duration = ended.saturating_duration_since(operation.started);
        let duration_ms = duration.as_secs_f64() * 1000.0;
        let config = &self.inner.config;
        let threshold = config.slow_operation_threshold;
        let detect = config.enable_bottleneck_detection;

        let bottlenecks: Vec<Bottleneck> = if detect {
            operation
                .stages
                .iter()
                .filter(|stage| stage.duration >= threshold)
                .map(|stage| Bottleneck {
                    stage: stage.name.clone(),
                    duration_ms: stage.duration_ms,
                    share: if duration_ms > 0.0 {
                        stage.duration_ms / duration_ms
                    } else {
                        0.0
                    },
                })
                .collect()
        } else {
            Vec::new()
        };
        let slow = detect && duration >= threshold;

        let suggestions = if config.enable_optimization_suggestions {
            suggest(&operation.operation_type, duration_ms, threshold, &bottlenecks, slow)
        } else {
            Vec::new()
        };

        state.total_operations += 1;
        state.bottlenecks_detected += bottlenecks.len() as u64;
        if slow && bottlenecks.is_empty() {
            state.bottlenecks_detected += 1;
        }
        state
            .samples
            .entry(operation.operation_type.clone())
            .or_default()
            .push_back(DurationSample {
                recorded: ended,
                duration_ms,
                success,
            });

        for bottleneck in &bottlenecks {
            info!(
                "Bottleneck in {} ({}): stage '{}' took {:.1}ms",
                operation_id, operation.operation_type, bottleneck.stage, bottleneck.duration_ms
            );
        }

        Ok(CompletedOperation {
            operation_id: operation_id.to_string(),
            operation_type: operation.operation_type,
            started_at: operation.started_at,
            success,
            duration_ms,
            duration,
            metadata,
            stage_breakdown: StageBreakdown::from_stages(operation.stages),
            bottlenecks,
            slow,
            suggestions,
        })
    }

    // == Stages ==
    pub fn start_stage(&self, operation_id: &str, stage_name: &str) -> Result<(), TrackingError> {
        if self.is_destroyed() {
            return Err(TrackingError::Destroyed);
        }

        let mut state = self.inner.state.lock();
        let operation = state
            .active
            .get_mut(operation_id)
            .ok_or_else(|| TrackingError::UnknownOperation(operation_id.to_string()))?;

        if !self.inner.config.enable_detailed_tracking {
            return Ok(());
        }
        if let Some(active) = &operation.current {
            return Err(TrackingError::StageAlreadyActive {
                operation_id: operation_id.to_string(),
                active: active.name.clone(),
            });
        }

        operation.current = Some(ActiveStage::start(stage_name));
        Ok(())
    }

    pub fn end_stage(&self, operation_id: &str, stage_name: &str) -> Result<(), TrackingError> {
        if self.is_destroyed() {
            return Err(TrackingError::Destroyed);
        }

        let mut state = self.inner.state.lock();
        let operation = state
            .active
            .get_mut(operation_id)
            .ok_or_else(|| TrackingError::UnknownOperation(operation_id.to_string()))?;

        if !self.inner.config.enable_detailed_tracking {
            return Ok(());
        }
        match operation.current.take() {
            Some(active) if active.name == stage_name => {
                let record = active.finish(Instant::now());
                debug!(
                    "Stage '{}' of {} took {:.2}ms",
                    record.name, operation_id, record.duration_ms
                );
                operation.stages.push(record);
                Ok(())
            }
            other => {
                operation.current = other;
                Err(TrackingError::StageNotStarted {
                    operation_id: operation_id.to_string(),
                    stage: stage_name.to_string(),
                })
            }
        }
    }

    // == Analytics ==
    /// Distribution of completed durations for `operation_type` inside the
    /// retention window.
    pub fn analytics(&self, operation_type: &str) -> OperationAnalytics {
        let retention = self.inner.config.tracking_retention;
        let now = Instant::now();
        let state = self.inner.state.lock();

        let retained: Vec<DurationSample> = state
            .samples
            .get(operation_type)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| now.saturating_duration_since(s.recorded) < retention)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        OperationAnalytics::compute(operation_type, &retained)
    }

    /// Operation types with retained samples, sorted.
    pub fn operation_types(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        state
            .samples
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(name, _)| name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> TrackerStats {
        let state = self.inner.state.lock();
        TrackerStats {
            active_operations: state.active.len(),
            total_operations: state.total_operations,
            bottlenecks_detected: state.bottlenecks_detected,
        }
    }

    // == Retention ==
    /// Drops samples and never-ended operations older than the retention
    /// window.
    pub fn prune(&self) -> PruneReport {
        let retention = self.inner.config.tracking_retention;
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        let mut pruned_samples = 0;
        for samples in state.samples.values_mut() {
            while samples
                .front()
                .is_some_and(|s| now.saturating_duration_since(s.recorded) >= retention)
            {
                samples.pop_front();
                pruned_samples += 1;
            }
        }
        state.samples.retain(|_, samples| !samples.is_empty());

        let before = state.active.len();
        state
            .active
            .retain(|_, op| now.saturating_duration_since(op.started) < retention);
        let abandoned_operations = before - state.active.len();
        if abandoned_operations > 0 {
            warn!("Dropped {} tracked operations never ended", abandoned_operations);
        }

        PruneReport {
            pruned_samples,
            abandoned_operations,
        }
    }

    // == Destroy ==
    /// Stops the retention task and discards all state.
    ///
    /// Idempotent. Afterwards every tracking call fails with
    /// [`TrackingError::Destroyed`].
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = self.inner.retention.lock().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        let mut state = self.inner.state.lock();
        state.active.clear();
        state.samples.clear();
        info!("Processing time tracker destroyed");
    }
}

fn suggest(
    operation_type: &str,
    duration_ms: f64,
    threshold: Duration,
    bottlenecks: &[Bottleneck],
    slow: bool,
) -> Vec<String> {
    let mut suggestions: Vec<String> = bottlenecks
        .iter()
        .map(|b| {
            format!(
                "stage '{}' of {} took {:.0}ms ({:.0}% of the operation); cache or batch its work",
                b.stage,
                operation_type,
                b.duration_ms,
                b.share * 100.0
            )
        })
        .collect();

    if slow && bottlenecks.is_empty() {
        suggestions.push(format!(
            "{} took {:.0}ms, over the {}ms threshold with no single slow stage; add finer stages",
            operation_type,
            duration_ms,
            threshold.as_millis()
        ));
    }
    suggestions
}
