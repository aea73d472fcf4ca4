//! Response DTOs for the observability API
//!
//! Bodies that are not a component snapshot serialized as-is.

use serde::Serialize;

use crate::cache::{HealthLevel, HealthStatus};

/// Response body for DELETE /cache/:resource_type/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    pub resource_type: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(resource_type: impl Into<String>, key: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let key = key.into();
        Self {
            message: format!("Key '{}:{}' invalidated", resource_type, key),
            resource_type,
            key,
        }
    }
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthLevel,
    pub memory_pressure: f64,
    pub cache_efficiency: f64,
    pub active_operations: usize,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Builds the response from the cache health report, stamped now.
    pub fn new(health: HealthStatus, active_operations: usize) -> Self {
        Self {
            status: health.status,
            memory_pressure: health.memory_pressure,
            cache_efficiency: health.cache_efficiency,
            active_operations,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
