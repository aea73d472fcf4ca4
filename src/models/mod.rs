//! Response models for the observability API
//!
//! Component snapshots serialize directly; this module holds the bodies
//! assembled by the handlers themselves.

pub mod responses;

pub use responses::{DeleteResponse, HealthResponse};
