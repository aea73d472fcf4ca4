//! Cache Statistics Module
//!
//! Tracks cache performance metrics and derives the advisory health status.

use serde::Serialize;

/// Memory pressure at or above which the cache is critical.
pub const CRITICAL_MEMORY_PRESSURE: f64 = 0.9;
/// Memory pressure at or above which the cache is degraded.
pub const WARNING_MEMORY_PRESSURE: f64 = 0.75;
/// Efficiency below which a warmed-up cache is degraded.
pub const WARNING_EFFICIENCY: f64 = 0.5;
/// Accesses required before efficiency influences health.
pub const MIN_ACCESSES_FOR_EFFICIENCY: u64 = 100;

// == Cache Stats ==
/// Running counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads that found nothing or an expired entry
    pub misses: u64,
    /// Successful stores
    pub sets: u64,
    /// Explicit deletions that removed an entry
    pub deletes: u64,
    /// Entries evicted to respect a capacity bound
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the cache
    pub total_items: usize,
    /// Sum of the size estimates of all entries, in bytes
    pub current_memory_usage: usize,
    /// hits / (hits + misses), 0 with no accesses
    pub cache_efficiency: f64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Copies the live gauges and derives efficiency.
    pub fn snapshot(&self, total_items: usize, current_memory_usage: usize) -> Self {
        Self {
            total_items,
            current_memory_usage,
            cache_efficiency: self.hit_rate(),
            ..self.clone()
        }
    }
}

// == Health ==
/// Tiered health label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

/// Advisory health report for a cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: HealthLevel,
    /// current_memory_usage / max_memory_usage
    pub memory_pressure: f64,
    pub cache_efficiency: f64,
}

impl HealthStatus {
    /// Derives the health tier from memory pressure and efficiency.
    pub fn evaluate(stats: &CacheStats, max_memory_usage: usize) -> Self {
        let memory_pressure = if max_memory_usage == 0 {
            0.0
        } else {
            stats.current_memory_usage as f64 / max_memory_usage as f64
        };
        let cache_efficiency = stats.hit_rate();
        let accesses = stats.hits + stats.misses;

        let status = if memory_pressure >= CRITICAL_MEMORY_PRESSURE {
            HealthLevel::Critical
        } else if memory_pressure >= WARNING_MEMORY_PRESSURE
            || (accesses >= MIN_ACCESSES_FOR_EFFICIENCY && cache_efficiency < WARNING_EFFICIENCY)
        {
            HealthLevel::Warning
        } else {
            HealthLevel::Healthy
        };

        Self {
            status,
            memory_pressure,
            cache_efficiency,
        }
    }
}
