//! Resource Cache - in-process caching and performance tracking
//!
//! Caches expensive resources with TTL expiration, LRU and memory-bound
//! eviction, and records operation metrics and per-stage processing times.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod processing;
pub mod tasks;

pub use api::AppState;
pub use cache::{ResourceCache, SetOptions};
pub use config::{CacheConfig, Config, MetricsConfig, TrackerConfig};
pub use error::{CacheError, TrackingError};
pub use metrics::MetricsCollector;
pub use processing::ProcessingTimeTracker;
