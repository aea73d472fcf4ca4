//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, TTL
//! expiration and a memory budget.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheKey, CacheStats, HealthStatus, RecencyOrder, SetOptions, SizeEstimator,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Bounded cache storage with LRU eviction and TTL support.
///
/// The store itself is single-threaded; [`ResourceCache`](crate::cache::ResourceCache)
/// wraps it for shared async use.
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Access order for LRU eviction
    lru: RecencyOrder<CacheKey>,
    /// Performance statistics
    stats: CacheStats,
    /// Sum of entry size estimates
    memory_usage: usize,
    max_size: usize,
    max_memory_usage: usize,
    default_ttl: Duration,
    enable_metrics: bool,
    estimator: Arc<dyn SizeEstimator<V>>,
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.entries.len())
            .field("memory_usage", &self.memory_usage)
            .field("max_size", &self.max_size)
            .field("max_memory_usage", &self.max_memory_usage)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore from configuration.
    ///
    /// A `max_size` of zero is treated as one.
    pub fn new(config: &CacheConfig, estimator: Arc<dyn SizeEstimator<V>>) -> Self {
        Self {
            entries: HashMap::new(),
            lru: RecencyOrder::new(),
            stats: CacheStats::new(),
            memory_usage: 0,
            max_size: config.max_size.max(1),
            max_memory_usage: config.max_memory_usage,
            default_ttl: config.default_ttl,
            enable_metrics: config.enable_metrics,
            estimator,
        }
    }

    // == Set ==
    /// Stores a value, evicting existing entries if a bound would be exceeded.
    ///
    /// If the key already exists, the value is overwritten and TTL is reset.
    /// Fails with [`CacheError::EntryTooLarge`] when the value alone is
    /// larger than the memory budget; the store is left untouched.
    pub fn set(&mut self, key: &str, value: V, options: &SetOptions) -> Result<()> {
        let key = CacheKey::new(key, options.resource_type.as_deref());
        let size = self.estimator.estimate(&value)? + key.byte_len();

        if size > self.max_memory_usage {
            warn!(
                "Refusing to cache {}: {} bytes exceeds budget of {} bytes",
                key, size, self.max_memory_usage
            );
            return Err(CacheError::EntryTooLarge {
                size,
                limit: self.max_memory_usage,
            });
        }

        // Overwrite releases the old entry before making room
        self.remove_entry(&key);
        self.make_room(size);

        let ttl = options.ttl.unwrap_or(self.default_ttl);
        self.entries
            .insert(key.clone(), CacheEntry::new(value, ttl, size));
        self.lru.touch(&key);
        self.memory_usage += size;
        self.count(CacheStats::record_set);

        debug!("Cached {} ({} bytes, ttl {:?})", key, size, ttl);
        Ok(())
    }

    // == Get ==
    /// Retrieves a live value.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str, resource_type: Option<&str>) -> Option<V> {
        let key = CacheKey::new(key, resource_type);
        match self.lookup(&key) {
            Some(value) => {
                self.count(CacheStats::record_hit);
                Some(value)
            }
            None => {
                self.count(CacheStats::record_miss);
                None
            }
        }
    }

    // == Has ==
    /// Checks for a live value without affecting hit/miss counters.
    pub fn has(&mut self, key: &str, resource_type: Option<&str>) -> bool {
        self.peek(key, resource_type).is_some()
    }

    /// Like `get`, but leaves hit/miss counters alone.
    pub fn peek(&mut self, key: &str, resource_type: Option<&str>) -> Option<V> {
        let key = CacheKey::new(key, resource_type);
        self.lookup(&key)
    }

    /// Like `get`, but counts only hits.
    ///
    /// Cache-aside callers count the miss themselves once they commit to
    /// loading the value, so each call counts exactly one access.
    pub fn get_counting_hits(&mut self, key: &str, resource_type: Option<&str>) -> Option<V> {
        let value = self.peek(key, resource_type);
        if value.is_some() {
            self.count(CacheStats::record_hit);
        }
        value
    }

    pub fn record_miss(&mut self) {
        self.count(CacheStats::record_miss);
    }

    // == Delete ==
    /// Removes an entry, returning whether one was present.
    pub fn delete(&mut self, key: &str, resource_type: Option<&str>) -> bool {
        let key = CacheKey::new(key, resource_type);
        if self.remove_entry(&key).is_some() {
            self.count(CacheStats::record_delete);
            true
        } else {
            false
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.remove_entry(&key);
        }

        if count > 0 && self.enable_metrics {
            self.stats.record_expirations(count);
        }
        count
    }

    /// Removes every entry; counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.memory_usage = 0;
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len(), self.memory_usage)
    }

    /// Zeros all counters.
    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::new();
    }

    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::evaluate(&self.stats(), self.max_memory_usage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    // == Internals ==
    /// Returns a clone of a live value, touching it; drops it if expired.
    fn lookup(&mut self, key: &CacheKey) -> Option<V> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.remove_entry(key);
            if self.enable_metrics {
                self.stats.record_expirations(1);
            }
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.touch();
        let value = entry.value.clone();
        self.lru.touch(key);
        Some(value)
    }

    fn remove_entry(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.memory_usage -= entry.size_estimate;
        Some(entry)
    }

    fn over_capacity(&self, incoming: usize) -> bool {
        self.entries.len() >= self.max_size
            || self.memory_usage + incoming > self.max_memory_usage
    }

    /// Frees space for `incoming` bytes: expired entries go first, then the
    /// least recently used.
    fn make_room(&mut self, incoming: usize) {
        if !self.over_capacity(incoming) {
            return;
        }

        let expired = self.cleanup_expired();
        if expired > 0 {
            debug!("Reclaimed {} expired entries before insert", expired);
        }

        while self.over_capacity(incoming) {
            let Some(victim) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.memory_usage -= entry.size_estimate;
                self.count(CacheStats::record_eviction);
                debug!("Evicted {} ({} bytes)", victim, entry.size_estimate);
            }
        }
    }

    fn count(&mut self, record: impl FnOnce(&mut CacheStats)) {
        if self.enable_metrics {
            record(&mut self.stats);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FixedSizeEstimator, JsonSizeEstimator};
    use std::thread::sleep;

    fn config(max_size: usize, max_memory_usage: usize) -> CacheConfig {
        CacheConfig {
            max_size,
            max_memory_usage,
            default_ttl: Duration::from_secs(300),
            enable_metrics: true,
            cleanup_interval: Duration::ZERO,
        }
    }

    fn json_store(max_size: usize) -> CacheStore<String> {
        CacheStore::new(&config(max_size, 1024 * 1024), Arc::new(JsonSizeEstimator))
    }

    fn no_opts() -> SetOptions {
        SetOptions::default()
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = json_store(100);

        store.set("key1", "value1".to_string(), &no_opts()).unwrap();

        assert_eq!(store.get("key1", None), Some("value1".to_string()));
        assert!(store.has("key1", None));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = json_store(100);
        assert_eq!(store.get("nonexistent", None), None);
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_resource_type_namespaces() {
        let mut store = json_store(100);
        let opts = SetOptions::new().resource_type("model");

        store.set("bert", "weights".to_string(), &opts).unwrap();

        assert_eq!(store.get("bert", None), None);
        assert_eq!(store.get("bert", Some("model")), Some("weights".to_string()));
        assert!(!store.delete("bert", Some("connection")));
        assert!(store.delete("bert", Some("model")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_delete() {
        let mut store = json_store(100);

        store.set("key1", "value1".to_string(), &no_opts()).unwrap();
        assert!(store.delete("key1", None));
        assert!(!store.delete("key1", None));

        assert!(store.is_empty());
        assert_eq!(store.memory_usage(), 0);
        assert_eq!(store.stats().deletes, 1);
    }

    #[test]
    fn test_store_overwrite_releases_old_size() {
        let mut store = json_store(100);

        store.set("key1", "a".repeat(100), &no_opts()).unwrap();
        store.set("key1", "b".to_string(), &no_opts()).unwrap();

        assert_eq!(store.get("key1", None), Some("b".to_string()));
        assert_eq!(store.len(), 1);
        // "b" serializes to 3 bytes, plus "general" + "key1"
        assert_eq!(store.memory_usage(), 3 + 7 + 4);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = json_store(100);
        let opts = SetOptions::new().ttl(Duration::from_millis(30));

        store.set("key1", "value1".to_string(), &opts).unwrap();
        assert!(store.get("key1", None).is_some());

        sleep(Duration::from_millis(50));

        assert!(!store.has("key1", None));
        assert_eq!(store.get("key1", None), None);
        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.total_items, 0);
    }

    #[test]
    fn test_has_does_not_count() {
        let mut store = json_store(100);
        store.set("key1", "value1".to_string(), &no_opts()).unwrap();

        assert!(store.has("key1", None));
        assert!(!store.has("missing", None));

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = json_store(3);

        store.set("key1", "value1".to_string(), &no_opts()).unwrap();
        store.set("key2", "value2".to_string(), &no_opts()).unwrap();
        store.set("key3", "value3".to_string(), &no_opts()).unwrap();
        store.set("key4", "value4".to_string(), &no_opts()).unwrap();

        assert_eq!(store.len(), 3);
        assert!(!store.has("key1", None));
        assert!(store.has("key2", None));
        assert!(store.has("key4", None));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = json_store(3);

        store.set("key1", "value1".to_string(), &no_opts()).unwrap();
        store.set("key2", "value2".to_string(), &no_opts()).unwrap();
        store.set("key3", "value3".to_string(), &no_opts()).unwrap();

        store.get("key1", None).unwrap();
        store.set("key4", "value4".to_string(), &no_opts()).unwrap();

        assert!(store.has("key1", None));
        assert!(!store.has("key2", None));
    }

    #[test]
    fn test_store_prefers_expired_over_lru() {
        let mut store = json_store(3);
        let short = SetOptions::new().ttl(Duration::from_millis(20));

        store.set("old", "v".to_string(), &no_opts()).unwrap();
        store.set("short", "v".to_string(), &short).unwrap();
        store.set("recent", "v".to_string(), &no_opts()).unwrap();

        sleep(Duration::from_millis(40));
        store.set("new", "v".to_string(), &no_opts()).unwrap();

        // "old" is least recently used but "short" expired first
        assert!(store.has("old", None));
        assert!(store.has("new", None));
        let stats = store.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_store_memory_bound_eviction() {
        let estimator = Arc::new(FixedSizeEstimator(40));
        // Each entry costs 40 + "general" (7) + 2 byte key = 49
        let mut store: CacheStore<u8> = CacheStore::new(&config(100, 100), estimator);

        store.set("k1", 1, &no_opts()).unwrap();
        store.set("k2", 2, &no_opts()).unwrap();
        assert_eq!(store.memory_usage(), 98);

        store.set("k3", 3, &no_opts()).unwrap();

        assert_eq!(store.len(), 2);
        assert!(!store.has("k1", None));
        assert!(store.memory_usage() <= 100);
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_value_too_large() {
        let estimator = Arc::new(FixedSizeEstimator(500));
        let mut store: CacheStore<u8> = CacheStore::new(&config(100, 100), estimator);

        let result = store.set("big", 1, &no_opts());
        assert_eq!(
            result,
            Err(CacheError::EntryTooLarge {
                size: 510,
                limit: 100
            })
        );
        assert!(store.is_empty());
        assert_eq!(store.stats().sets, 0);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = json_store(100);

        store
            .set("key1", "value1".to_string(), &SetOptions::new().ttl(Duration::from_millis(20)))
            .unwrap();
        store
            .set("key2", "value2".to_string(), &SetOptions::new().ttl(Duration::from_secs(10)))
            .unwrap();

        sleep(Duration::from_millis(40));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.has("key2", None));
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_stats_efficiency() {
        let mut store = json_store(100);

        store.set("key1", "value1".to_string(), &no_opts()).unwrap();
        store.get("key1", None);
        store.get("key1", None);
        store.get("key1", None);
        store.get("nonexistent", None);

        let stats = store.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.cache_efficiency, 0.75);
        assert_eq!(stats.total_items, 1);

        store.reset_stats();
        assert_eq!(store.stats().hits, 0);
        assert_eq!(store.stats().total_items, 1);
    }

    #[test]
    fn test_store_metrics_disabled() {
        let mut cfg = config(100, 1024);
        cfg.enable_metrics = false;
        let mut store: CacheStore<String> = CacheStore::new(&cfg, Arc::new(JsonSizeEstimator));

        store.set("key1", "v".to_string(), &no_opts()).unwrap();
        store.get("key1", None);
        store.get("missing", None);

        let stats = store.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.total_items, 1);
    }

    #[test]
    fn test_store_clear() {
        let mut store = json_store(100);
        store.set("a", "1".to_string(), &no_opts()).unwrap();
        store.set("b", "2".to_string(), &no_opts()).unwrap();

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.memory_usage(), 0);
        assert_eq!(store.stats().sets, 2);
    }
}
