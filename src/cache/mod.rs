//! Cache Module
//!
//! Provides in-memory caching of expensive resources with TTL expiration,
//! LRU eviction and a memory budget.

mod entry;
mod handle;
mod recency;
mod size;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CacheKey, SetOptions};
pub use handle::{ResourceCache, WeakResourceCache};
pub use recency::RecencyOrder;
pub use size::{FixedSizeEstimator, JsonSizeEstimator, SizeEstimator};
pub use stats::{CacheStats, HealthLevel, HealthStatus};
pub use store::CacheStore;

// == Public Constants ==
/// Namespace used when no resource type is given
pub const DEFAULT_RESOURCE_TYPE: &str = "general";
