//! Configuration Module
//!
//! Handles loading and managing configuration for the cache, the metrics
//! collector and the processing time tracker from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cache store configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// TTL applied to entries stored without an explicit TTL
    pub default_ttl: Duration,
    /// Upper bound on the summed size estimate of all entries, in bytes
    pub max_memory_usage: usize,
    /// Whether hit/miss/set/eviction counters are maintained
    pub enable_metrics: bool,
    /// Cadence of the background TTL sweep; zero disables it
    pub cleanup_interval: Duration,
}

impl CacheConfig {
    /// Loads cache settings from `CACHE_*` environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_MAX_MEMORY_BYTES` - Memory budget in bytes (default: 100 MiB)
    /// - `CACHE_ENABLE_METRICS` - Maintain counters (default: true)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep interval in milliseconds (default: 60000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: env_or("CACHE_MAX_SIZE", defaults.max_size),
            default_ttl: env_ms_or("CACHE_DEFAULT_TTL_MS", defaults.default_ttl),
            max_memory_usage: env_or("CACHE_MAX_MEMORY_BYTES", defaults.max_memory_usage),
            enable_metrics: env_or("CACHE_ENABLE_METRICS", defaults.enable_metrics),
            cleanup_interval: env_ms_or("CACHE_CLEANUP_INTERVAL_MS", defaults.cleanup_interval),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            default_ttl: Duration::from_millis(300_000),
            max_memory_usage: 100 * 1024 * 1024,
            enable_metrics: true,
            cleanup_interval: Duration::from_millis(60_000),
        }
    }
}

/// Performance metrics collector configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Sample process CPU and memory during aggregation
    pub enable_system_metrics: bool,
    /// Record start/end of named operations
    pub enable_operation_tracking: bool,
    /// Record resource usage events
    pub enable_resource_tracking: bool,
    /// Age after which completed operation records are pruned
    pub metrics_retention: Duration,
    /// Cadence of the aggregation task; zero disables it
    pub aggregation_interval: Duration,
    /// Newest completed records included in a metrics snapshot
    pub max_recent_records: usize,
}

impl MetricsConfig {
    /// Loads collector settings from `METRICS_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_system_metrics: env_or("METRICS_ENABLE_SYSTEM", defaults.enable_system_metrics),
            enable_operation_tracking: env_or(
                "METRICS_ENABLE_OPERATIONS",
                defaults.enable_operation_tracking,
            ),
            enable_resource_tracking: env_or(
                "METRICS_ENABLE_RESOURCES",
                defaults.enable_resource_tracking,
            ),
            metrics_retention: env_ms_or("METRICS_RETENTION_MS", defaults.metrics_retention),
            aggregation_interval: env_ms_or(
                "METRICS_AGGREGATION_INTERVAL_MS",
                defaults.aggregation_interval,
            ),
            max_recent_records: env_or("METRICS_MAX_RECENT", defaults.max_recent_records),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_system_metrics: true,
            enable_operation_tracking: true,
            enable_resource_tracking: true,
            metrics_retention: Duration::from_millis(3_600_000),
            aggregation_interval: Duration::from_millis(60_000),
            max_recent_records: 100,
        }
    }
}

/// Processing time tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Record individual stages
    pub enable_detailed_tracking: bool,
    /// Flag stages slower than `slow_operation_threshold`
    pub enable_bottleneck_detection: bool,
    /// Attach suggestions to completed operations with bottlenecks
    pub enable_optimization_suggestions: bool,
    /// Duration at or above which a stage counts as a bottleneck
    pub slow_operation_threshold: Duration,
    /// Window of completed durations kept for analytics
    pub tracking_retention: Duration,
}

impl TrackerConfig {
    /// Loads tracker settings from `TRACKER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_detailed_tracking: env_or(
                "TRACKER_ENABLE_DETAILED",
                defaults.enable_detailed_tracking,
            ),
            enable_bottleneck_detection: env_or(
                "TRACKER_ENABLE_BOTTLENECKS",
                defaults.enable_bottleneck_detection,
            ),
            enable_optimization_suggestions: env_or(
                "TRACKER_ENABLE_SUGGESTIONS",
                defaults.enable_optimization_suggestions,
            ),
            slow_operation_threshold: env_ms_or(
                "TRACKER_SLOW_THRESHOLD_MS",
                defaults.slow_operation_threshold,
            ),
            tracking_retention: env_ms_or("TRACKER_RETENTION_MS", defaults.tracking_retention),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enable_detailed_tracking: true,
            enable_bottleneck_detection: true,
            enable_optimization_suggestions: true,
            slow_operation_threshold: Duration::from_millis(1000),
            tracking_retention: Duration::from_millis(3_600_000),
        }
    }
}

/// Full service configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub metrics: MetricsConfig,
    pub tracker: TrackerConfig,
    /// HTTP port for the observability endpoints
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// `SERVER_PORT` selects the HTTP port (default: 3000).
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            metrics: MetricsConfig::from_env(),
            tracker: TrackerConfig::from_env(),
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            metrics: MetricsConfig::default(),
            tracker: TrackerConfig::default(),
            server_port: 3000,
        }
    }
}

// == Env Helpers ==
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_ms_or(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
