use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{engine} does not support {capability}")]
    UnsupportedCapability {
        engine: String,
        capability: &'static str,
    },

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Relation does not exist: {0}")]
    SchemaMissing(String),

    #[error("Query failed: {0}")]
    QueryFailed(anyhow::Error),
}

impl AccessError {
    pub fn unsupported(engine: &str, capability: &'static str) -> Self {
        AccessError::UnsupportedCapability {
            engine: engine.to_string(),
            capability,
        }
    }
}

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNDEFINED_TABLE) {
                return AccessError::SchemaMissing(db_err.message().to_string());
            }
        }
        AccessError::QueryFailed(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AccessError {
    fn from(err: mongodb::error::Error) -> Self {
        AccessError::QueryFailed(anyhow::Error::new(err))
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::PermissionDenied(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            e @ AccessError::UnsupportedCapability { .. } => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ AccessError::InvalidIdentifier(_) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ AccessError::SchemaMissing(_) => AppError::DatabaseError(anyhow::Error::new(e)),
            AccessError::QueryFailed(e) => AppError::DatabaseError(e),
        }
    }
}
