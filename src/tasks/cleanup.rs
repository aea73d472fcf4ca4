//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::WeakResourceCache;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task holds only a weak reference and exits once the cache is
/// dropped or destroyed. The returned handle aborts it early.
///
/// # Example
/// ```ignore
/// let cache: ResourceCache<String> = ResourceCache::new(CacheConfig::default());
/// let handle = spawn_cleanup_task(cache.downgrade(), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: WeakResourceCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                break;
            };
            if cache.is_destroyed() {
                break;
            }

            let removed = cache.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }

        debug!("TTL cleanup task stopped");
    })
}
