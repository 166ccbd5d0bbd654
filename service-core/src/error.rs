use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::{codes, ApiError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::ValidationError(e) => {
                ApiError::new(codes::INVALID_PARAMS, "INVALID_PARAMS", e.to_string())
            }
            AppError::BadRequest(e) => {
                ApiError::new(codes::INVALID_PARAMS, "INVALID_PARAMS", e.to_string())
            }
            AppError::NotFound(e) => ApiError::new(codes::NOT_FOUND, "NOT_FOUND", e.to_string()),
            AppError::Unauthorized(e) => {
                ApiError::new(codes::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
            }
            AppError::Forbidden(e) => ApiError::new(codes::FORBIDDEN, "FORBIDDEN", e.to_string()),
            AppError::TooManyRequests(msg, retry) => {
                ApiError::new(codes::TOO_MANY_REQUESTS, "RATE_LIMITED", msg).retry_after(retry)
            }
            AppError::InternalError(e)
            | AppError::DatabaseError(e)
            | AppError::ConfigError(e) => {
                tracing::error!(error = %format!("{:#}", e), "Internal error");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
