//! Error types for the resource cache and the performance trackers
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Errors reported by the cache store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A single value is larger than the whole memory budget
    #[error("Entry of {size} bytes exceeds memory limit of {limit} bytes")]
    EntryTooLarge { size: usize, limit: usize },

    /// The size estimator could not measure the value
    #[error("Size estimation failed: {0}")]
    SizeEstimation(String),

    /// The cache has been destroyed
    #[error("Cache has been destroyed")]
    Destroyed,
}

// == Tracking Error Enum ==
/// Caller-contract violations reported by the metrics collector and the
/// processing time tracker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// An operation with this id is already open
    #[error("Operation already started: {0}")]
    DuplicateOperation(String),

    /// No open operation with this id
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Another stage is still running on this operation
    #[error("Stage '{active}' still active on operation {operation_id}")]
    StageAlreadyActive {
        operation_id: String,
        active: String,
    },

    /// The stage being ended is not the running one
    #[error("Stage '{stage}' not started on operation {operation_id}")]
    StageNotStarted {
        operation_id: String,
        stage: String,
    },

    /// The tracker has been destroyed
    #[error("Tracker has been destroyed")]
    Destroyed,
}

// == IntoResponse Implementations ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::SizeEstimation(_) => StatusCode::BAD_REQUEST,
            CacheError::Destroyed => StatusCode::SERVICE_UNAVAILABLE,
        };

        error_response(status, self.to_string())
    }
}

impl IntoResponse for TrackingError {
    fn into_response(self) -> Response {
        let status = match &self {
            TrackingError::UnknownOperation(_) => StatusCode::NOT_FOUND,
            TrackingError::Destroyed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        };

        error_response(status, self.to_string())
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = Json(json!({
        "error": message
    }));

    (status, body).into_response()
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
