//! Cache Entry Module
//!
//! Defines individual cache entries, their namespaced keys and per-call
//! storage options.

use std::fmt;
use std::time::{Duration, Instant};

use crate::cache::DEFAULT_RESOURCE_TYPE;

// == Cache Key ==
/// A key scoped to a resource-type namespace.
///
/// The same `key` under two resource types names two distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource_type: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(key: impl Into<String>, resource_type: Option<&str>) -> Self {
        Self {
            resource_type: resource_type.unwrap_or(DEFAULT_RESOURCE_TYPE).to_string(),
            key: key.into(),
        }
    }

    /// Bytes charged against the memory budget for the key itself.
    pub fn byte_len(&self) -> usize {
        self.resource_type.len() + self.key.len()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.key)
    }
}

// == Set Options ==
/// Per-call overrides for `set` and `get_or_set`.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// TTL for this entry; the store default applies when `None`
    pub ttl: Option<Duration>,
    /// Namespace; `"general"` when `None`
    pub resource_type: Option<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation instant
    pub created_at: Instant,
    /// Time-to-live measured from `created_at`
    pub ttl: Duration,
    /// Estimated size in bytes (value plus key)
    pub size_estimate: usize,
    /// Last read or peek
    pub last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` after now.
    pub fn new(value: V, ttl: Duration, size_estimate: usize) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            ttl,
            size_estimate,
            last_accessed: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once `now - created_at >= ttl`, so a zero TTL
    /// is expired immediately.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    /// Marks the entry as accessed now.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    // == Time To Live ==
    /// Returns the remaining TTL, `Duration::ZERO` once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.created_at))
    }
}
