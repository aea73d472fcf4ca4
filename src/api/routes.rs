//! API Routes
//!
//! Configures the Axum router with the observability endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    analytics_handler, cache_stats_handler, health_handler, invalidate_handler,
    metrics_handler, metrics_summary_handler, processing_stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Cache health and active operation count
/// - `GET /cache/stats` - Cache counters
/// - `DELETE /cache/:resource_type/:key` - Invalidate one entry
/// - `GET /metrics` - Full metrics snapshot
/// - `GET /metrics/summary` - Condensed metrics
/// - `GET /processing/stats` - Tracker counters
/// - `GET /processing/analytics/:operation_type` - Duration analytics
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache/:resource_type/:key", delete(invalidate_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/summary", get(metrics_summary_handler))
        .route("/processing/stats", get(processing_stats_handler))
        .route(
            "/processing/analytics/:operation_type",
            get(analytics_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
