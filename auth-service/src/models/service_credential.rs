use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Credentials of a calling service. Provisioned out of band; rotation
/// replaces `secret_hash`.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceCredential {
    pub id: i64,
    pub service_id: String,
    pub service_name: String,
    pub service_type: String,
    pub secret_hash: String,
    pub description: Option<String>,
    /// Exact API paths, or a single `*` for everything.
    pub allowed_apis: Vec<String>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit trail for an issued service token. Only the digest is kept.
#[derive(Debug, Clone)]
pub struct ServiceTokenRecord {
    pub service_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
