//! Shared Cache Handle
//!
//! `ResourceCache` wraps a [`CacheStore`] for concurrent async use, adds the
//! cache-aside `get_or_set` helper and owns the background TTL sweep.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheKey, CacheStats, CacheStore, HealthStatus, JsonSizeEstimator, SetOptions, SizeEstimator,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_cleanup_task;

type FlightMap = Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>;

struct Inner<V> {
    store: RwLock<CacheStore<V>>,
    /// One lock per key with a factory call in progress
    in_flight: FlightMap,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}

// == Resource Cache ==
/// Cloneable handle to a bounded, TTL-aware cache of expensive resources.
///
/// Concurrent `get_or_set` calls for the same key are coalesced: one caller
/// runs the factory while the others wait and then read the stored result.
/// If that factory fails, the next waiter runs its own factory.
pub struct ResourceCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ResourceCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning reference held by background tasks.
pub struct WeakResourceCache<V> {
    inner: Weak<Inner<V>>,
}

impl<V> WeakResourceCache<V> {
    pub fn upgrade(&self) -> Option<ResourceCache<V>> {
        self.inner.upgrade().map(|inner| ResourceCache { inner })
    }
}

impl<V> ResourceCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache measuring values by their JSON length.
    ///
    /// When called inside a tokio runtime with a non-zero
    /// `cleanup_interval`, the periodic TTL sweep starts immediately.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_estimator(config, Arc::new(JsonSizeEstimator))
    }
}

impl<V> ResourceCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with a custom size-measurement strategy.
    pub fn with_estimator(config: CacheConfig, estimator: Arc<dyn SizeEstimator<V>>) -> Self {
        let cache = Self {
            inner: Arc::new(Inner {
                store: RwLock::new(CacheStore::new(&config, estimator)),
                in_flight: Mutex::new(HashMap::new()),
                cleanup: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        };

        if !config.cleanup_interval.is_zero() {
            if tokio::runtime::Handle::try_current().is_ok() {
                let handle = spawn_cleanup_task(cache.downgrade(), config.cleanup_interval);
                *cache.inner.cleanup.lock() = Some(handle);
            } else {
                warn!("No tokio runtime available, TTL sweep disabled");
            }
        }

        info!(
            "Resource cache initialized: max_size={}, max_memory={} bytes, default_ttl={:?}",
            config.max_size, config.max_memory_usage, config.default_ttl
        );
        cache
    }

    pub fn downgrade(&self) -> WeakResourceCache<V> {
        WeakResourceCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    // == Set ==
    /// Stores a value. See [`CacheStore::set`].
    pub async fn set(&self, key: &str, value: V, options: SetOptions) -> Result<()> {
        if self.is_destroyed() {
            return Err(CacheError::Destroyed);
        }
        let mut store = self.inner.store.write().await;
        // destroy() may have cleared the store while we waited for the lock
        if self.is_destroyed() {
            return Err(CacheError::Destroyed);
        }
        store.set(key, value, &options)
    }

    // == Get ==
    /// Returns the live value for `key`, counting a hit or miss.
    pub async fn get(&self, key: &str, resource_type: Option<&str>) -> Option<V> {
        if self.is_destroyed() {
            return None;
        }
        // Write lock: reads update LRU order and counters
        self.inner.store.write().await.get(key, resource_type)
    }

    /// Peeks for a live value without counting a hit or miss.
    pub async fn has(&self, key: &str, resource_type: Option<&str>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.inner.store.write().await.has(key, resource_type)
    }

    pub async fn delete(&self, key: &str, resource_type: Option<&str>) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.inner.store.write().await.delete(key, resource_type)
    }

    // == Get Or Set ==
    /// Cache-aside lookup.
    ///
    /// On a hit the factory is never called. On a miss the factory runs once
    /// per key even under concurrent callers, and its result is stored and
    /// returned. Each call counts one access: the caller that runs the
    /// factory counts a miss, callers served from the cache (including those
    /// that waited on a concurrent load) count a hit.
    ///
    /// Factory errors propagate unchanged and leave the key unset.
    /// A result larger than the memory budget is returned as
    /// [`CacheError::EntryTooLarge`] converted into `E`.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        options: SetOptions,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: From<CacheError>,
    {
        if self.is_destroyed() {
            return Err(CacheError::Destroyed.into());
        }

        let resource_type = options.resource_type.as_deref();
        if let Some(value) = self
            .inner
            .store
            .write()
            .await
            .get_counting_hits(key, resource_type)
        {
            return Ok(value);
        }

        let slot = FlightSlot::join(&self.inner.in_flight, CacheKey::new(key, resource_type));
        let _permit = slot.flight.lock().await;

        // Another caller may have filled the key while we waited
        {
            let mut store = self.inner.store.write().await;
            if let Some(value) = store.get_counting_hits(key, resource_type) {
                debug!("Coalesced factory call for {}", slot.key);
                return Ok(value);
            }
            store.record_miss();
        }

        let value = match factory().await {
            Ok(value) => value,
            Err(err) => {
                debug!("Factory for {} failed, key left unset", slot.key);
                return Err(err);
            }
        };

        let mut store = self.inner.store.write().await;
        if self.is_destroyed() {
            return Err(CacheError::Destroyed.into());
        }
        store.set(key, value.clone(), &options)?;
        Ok(value)
    }

    // == Introspection ==
    pub async fn stats(&self) -> CacheStats {
        self.inner.store.read().await.stats()
    }

    pub async fn reset_stats(&self) {
        self.inner.store.write().await.reset_stats();
    }

    /// Advisory health derived from memory pressure and efficiency.
    pub async fn health_status(&self) -> HealthStatus {
        self.inner.store.read().await.health_status()
    }

    pub async fn len(&self) -> usize {
        self.inner.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.store.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.store.write().await.clear();
    }

    // == Cleanup Expired ==
    /// Removes every expired entry, returning how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        self.inner.store.write().await.cleanup_expired()
    }

    // == Destroy ==
    /// Stops the TTL sweep and releases all entries.
    ///
    /// Idempotent. Afterwards mutations fail with [`CacheError::Destroyed`]
    /// and reads behave as misses on an empty cache.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = self.inner.cleanup.lock().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.inner.store.write().await.clear();
        info!("Resource cache destroyed");
    }
}

// == In-Flight Slot ==
/// Membership in the wait queue of one key; the last member out removes
/// the key's lock from the map.
struct FlightSlot<'a> {
    map: &'a FlightMap,
    key: CacheKey,
    flight: Arc<AsyncMutex<()>>,
}

impl<'a> FlightSlot<'a> {
    fn join(map: &'a FlightMap, key: CacheKey) -> Self {
        let flight = Arc::clone(
            map.lock()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        );
        Self { map, key, flight }
    }
}

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock();
        let last = map
            .get(&self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.flight))
            && Arc::strong_count(&self.flight) == 2;
        if last {
            map.remove(&self.key);
        }
    }
}
