//! Background Tasks Module
//!
//! Maintenance loops that run on their own timers alongside callers.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired cache entries at configured intervals
//! - Metrics Aggregation: Prunes old operation records, samples system usage
//! - Tracker Retention: Drops processing samples outside the retention window

mod aggregation;
mod cleanup;
mod retention;

pub use aggregation::spawn_aggregation_task;
pub use cleanup::spawn_cleanup_task;
pub use retention::spawn_retention_task;
