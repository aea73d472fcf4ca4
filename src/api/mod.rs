//! API Module
//!
//! Read-mostly HTTP surface over the cache, metrics collector and tracker.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /cache/stats` - Get cache statistics
//! - `DELETE /cache/:resource_type/:key` - Invalidate a cached resource
//! - `GET /metrics`, `GET /metrics/summary` - Operation and resource metrics
//! - `GET /processing/stats`, `GET /processing/analytics/:operation_type` - Stage timing

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
