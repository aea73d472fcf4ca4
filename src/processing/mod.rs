//! Processing Time Module
//!
//! Stage-level timing of multi-stage operations with bottleneck detection
//! and per-type duration analytics.

mod analytics;
mod stages;
mod tracker;

pub(crate) use analytics::DurationSample;
pub use analytics::{percentile, DurationStats, OperationAnalytics, Trend};
pub(crate) use stages::ActiveStage;
pub use stages::{StageBreakdown, StageRecord};
pub use tracker::{
    Bottleneck, CompletedOperation, ProcessingTimeTracker, PruneReport, TrackerStats,
    WeakProcessingTimeTracker,
};
