//! Size Estimation Module
//!
//! Pluggable strategies for measuring how many bytes a cached value costs
//! against the memory budget.

use serde::Serialize;

use crate::error::{CacheError, Result};

/// Measures a value for memory accounting.
pub trait SizeEstimator<V>: Send + Sync {
    fn estimate(&self, value: &V) -> Result<usize>;
}

/// Charges the length of the value's JSON serialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSizeEstimator;

impl<V: Serialize> SizeEstimator<V> for JsonSizeEstimator {
    fn estimate(&self, value: &V) -> Result<usize> {
        serde_json::to_vec(value)
            .map(|bytes| bytes.len())
            .map_err(|e| CacheError::SizeEstimation(e.to_string()))
    }
}

/// Charges the same number of bytes for every value.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeEstimator(pub usize);

impl<V> SizeEstimator<V> for FixedSizeEstimator {
    fn estimate(&self, _value: &V) -> Result<usize> {
        Ok(self.0)
    }
}
