use service_core::error::AppError;
use service_core::response::{codes, ApiError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("User account is disabled")]
    UserDisabled,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service is disabled")]
    ServiceDisabled,

    #[error("Invalid service secret")]
    InvalidSecret,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Required table missing: {0}")]
    SchemaMissing(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable string identifier placed in the response envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::UserDisabled => "USER_DISABLED",
            AuthError::InvalidPassword => "INVALID_PASSWORD",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::PermissionDenied(_) => "PERMISSION_DENIED",
            AuthError::ServiceNotFound => "SERVICE_NOT_FOUND",
            AuthError::ServiceDisabled => "SERVICE_DISABLED",
            AuthError::InvalidSecret => "INVALID_SECRET",
            AuthError::NotFound(_) => "RESOURCE_NOT_FOUND",
            AuthError::Conflict(_) => "ALREADY_EXISTS",
            AuthError::InvalidParams(_) => "INVALID_PARAMS",
            AuthError::SchemaMissing(_) => "SCHEMA_MISSING",
            AuthError::QueryFailed(_) => "QUERY_FAILED",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Numeric envelope code.
    pub fn code(&self) -> i32 {
        match self {
            AuthError::UserNotFound => codes::USER_NOT_FOUND,
            AuthError::UserDisabled | AuthError::ServiceDisabled => codes::FORBIDDEN,
            AuthError::InvalidPassword | AuthError::InvalidSecret => codes::UNAUTHORIZED,
            AuthError::InvalidToken | AuthError::TokenExpired | AuthError::TokenRevoked => {
                codes::INVALID_TOKEN
            }
            AuthError::PermissionDenied(_) => codes::PERMISSION_DENIED,
            AuthError::ServiceNotFound => codes::NOT_FOUND,
            AuthError::NotFound(_) => codes::RESOURCE_NOT_FOUND,
            AuthError::Conflict(_) | AuthError::InvalidParams(_) => codes::INVALID_PARAMS,
            AuthError::SchemaMissing(_) | AuthError::QueryFailed(_) | AuthError::Internal(_) => {
                codes::INTERNAL_ERROR
            }
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::SchemaMissing(_) | AuthError::QueryFailed(_) | AuthError::Internal(_)
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_infrastructure() {
            tracing::error!(error = %err, error_code = err.error_code(), "Infrastructure failure");
            return ApiError::new(err.code(), err.error_code(), "Internal server error");
        }
        ApiError::new(err.code(), err.error_code(), err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::QueryFailed(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            AuthError::Internal(e) => AppError::InternalError(e),
            AuthError::SchemaMissing(table) => {
                AppError::DatabaseError(anyhow::anyhow!("Required table missing: {}", table))
            }
            AuthError::InvalidParams(msg) | AuthError::Conflict(msg) => {
                AppError::BadRequest(anyhow::anyhow!(msg))
            }
            other => AppError::Unauthorized(anyhow::anyhow!(other.to_string())),
        }
    }
}
