//! Recency Order
//!
//! Least-recently-used ordering of cache keys for eviction.

use std::fmt;
use std::hash::Hash;

use ::lru::LruCache;

// == Recency Order ==
/// Access order of keys, oldest first out.
///
/// Unbounded: capacity limits are enforced by the store, which asks for the
/// oldest key when it needs room. Every operation is O(1).
pub struct RecencyOrder<K: Hash + Eq> {
    order: LruCache<K, ()>,
}

impl<K: Hash + Eq> fmt::Debug for RecencyOrder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecencyOrder")
            .field("len", &self.order.len())
            .finish()
    }
}

impl<K: Hash + Eq> Default for RecencyOrder<K> {
    fn default() -> Self {
        Self {
            order: LruCache::unbounded(),
        }
    }
}

impl<K: Hash + Eq + Clone> RecencyOrder<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as most recently used, inserting it if untracked.
    pub fn touch(&mut self, key: &K) {
        if self.order.get(key).is_none() {
            self.order.put(key.clone(), ());
        }
    }

    pub fn remove(&mut self, key: &K) {
        self.order.pop(key);
    }

    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_lru().map(|(key, _)| key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
