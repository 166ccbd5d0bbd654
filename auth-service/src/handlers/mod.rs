pub mod admin;
pub mod auth;
pub mod health;
pub mod internal;
pub mod metrics;
pub mod service;

use service_core::response::{codes, ApiError};

/// Unknown routes still answer with the envelope.
pub async fn not_found() -> ApiError {
    ApiError::new(codes::NOT_FOUND, "NOT_FOUND", "Route not found")
}
