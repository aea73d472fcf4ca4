//! API Handlers
//!
//! HTTP request handlers for the observability endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{CacheStats, ResourceCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::metrics::{MetricsCollector, MetricsSnapshot, MetricsSummary};
use crate::models::{DeleteResponse, HealthResponse};
use crate::processing::{OperationAnalytics, ProcessingTimeTracker, TrackerStats};

/// Application state shared across all handlers.
///
/// Each component is a cheap cloneable handle; cloning the state shares
/// the same cache, collector and tracker.
#[derive(Clone)]
pub struct AppState {
    pub cache: ResourceCache<Value>,
    pub metrics: MetricsCollector,
    pub tracker: ProcessingTimeTracker,
}

impl AppState {
    pub fn new(
        cache: ResourceCache<Value>,
        metrics: MetricsCollector,
        tracker: ProcessingTimeTracker,
    ) -> Self {
        Self {
            cache,
            metrics,
            tracker,
        }
    }

    /// Builds all three components from configuration.
    ///
    /// Call from inside a tokio runtime so the background tasks start.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ResourceCache::new(config.cache.clone()),
            MetricsCollector::new(config.metrics.clone()),
            ProcessingTimeTracker::new(config.tracker.clone()),
        )
    }

    /// Stops every background task and releases component state.
    pub async fn destroy(&self) {
        self.cache.destroy().await;
        self.metrics.destroy();
        self.tracker.destroy();
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.cache.health_status().await;
    Json(HealthResponse::new(health, state.tracker.stats().active_operations))
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

/// Handler for DELETE /cache/:resource_type/:key
///
/// Invalidates one cached resource; 404 when nothing was cached.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path((resource_type, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    if state.cache.delete(&key, Some(&resource_type)).await {
        Ok(Json(DeleteResponse::new(resource_type, key)))
    } else {
        Err(CacheError::NotFound(format!("{}:{}", resource_type, key)))
    }
}

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.metrics())
}

/// Handler for GET /metrics/summary
pub async fn metrics_summary_handler(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}

/// Handler for GET /processing/stats
pub async fn processing_stats_handler(State(state): State<AppState>) -> Json<TrackerStats> {
    Json(state.tracker.stats())
}

/// Handler for GET /processing/analytics/:operation_type
pub async fn analytics_handler(
    State(state): State<AppState>,
    Path(operation_type): Path<String>,
) -> Json<OperationAnalytics> {
    Json(state.tracker.analytics(&operation_type))
}
