//! Credential store access.
//!
//! [`CredentialStore`] is the seam the auth services are written against.
//! [`Database`] implements it over PostgreSQL; the tables are expected to
//! exist already (see `schema/auth_schema.sql`) and a missing table surfaces
//! as [`AuthError::SchemaMissing`].

use async_trait::async_trait;
use sqlx::PgPool;

use super::error::AuthError;
use crate::models::{
    AccessLogEntry, AssignmentStatus, NewUser, Permission, PermissionSeed, PrimaryRole, Role,
    ServiceCredential, ServiceTokenRecord, User,
};

pub const REQUIRED_TABLES: &[&str] = &[
    "auth_users",
    "auth_roles",
    "auth_permissions",
    "auth_role_permissions",
    "auth_user_roles",
    "auth_login_logs",
    "service_credentials",
    "service_tokens",
];

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AuthError>;

    /// Fails with `SchemaMissing` naming every absent table.
    async fn verify_schema(&self) -> Result<(), AuthError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError>;
    async fn create_user(&self, user: &NewUser) -> Result<User, AuthError>;
    async fn update_last_login(&self, user_id: i64) -> Result<(), AuthError>;

    /// Highest-level active role, ties broken by the latest assignment.
    async fn primary_role(&self, user_id: i64) -> Result<Option<PrimaryRole>, AuthError>;

    /// Active grants of a role, deduplicated and ordered by code.
    async fn role_permissions(&self, role: &str) -> Result<Vec<String>, AuthError>;
    async fn all_permission_codes(&self) -> Result<Vec<String>, AuthError>;
    async fn list_roles(&self) -> Result<Vec<Role>, AuthError>;

    async fn upsert_role(
        &self,
        name: &str,
        level: i32,
        description: &str,
    ) -> Result<Role, AuthError>;
    async fn upsert_permission(
        &self,
        seed: &PermissionSeed,
        service_name: &str,
    ) -> Result<Permission, AuthError>;

    /// Insert-if-absent. A soft-revoked grant stays revoked.
    async fn ensure_role_permission(&self, role: &str, code: &str) -> Result<(), AuthError>;

    /// Idempotent. Reactivates a revoked assignment.
    async fn assign_role(&self, user_id: i64, role: &str) -> Result<(), AuthError>;
    /// Returns false when there was no active assignment.
    async fn revoke_role(&self, user_id: i64, role: &str) -> Result<bool, AuthError>;
    /// Idempotent. Reactivates a revoked grant.
    async fn grant_permission(&self, role: &str, code: &str) -> Result<(), AuthError>;
    async fn revoke_permission(&self, role: &str, code: &str) -> Result<bool, AuthError>;

    async fn insert_access_log(&self, entry: &AccessLogEntry) -> Result<(), AuthError>;

    async fn find_service(&self, service_id: &str)
        -> Result<Option<ServiceCredential>, AuthError>;
    async fn touch_service(&self, service_id: &str) -> Result<(), AuthError>;
    async fn record_service_token(&self, record: &ServiceTokenRecord) -> Result<(), AuthError>;
}

const UNDEFINED_TABLE: &str = "42P01";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn db_error(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNDEFINED_TABLE) => return AuthError::SchemaMissing(db_err.message().to_string()),
            Some(UNIQUE_VIOLATION) => {
                return AuthError::Conflict(
                    db_err.constraint().unwrap_or("unique constraint").to_string(),
                )
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                return AuthError::NotFound(
                    db_err.constraint().unwrap_or("referenced row").to_string(),
                )
            }
            _ => {}
        }
    }
    AuthError::QueryFailed(err)
}

const USER_COLUMNS: &str = "id, username, email, password_hash, status, email_verified, \
     phone_verified, subscription_type, subscription_expires_at, last_login_at, created_at, updated_at";

const SERVICE_COLUMNS: &str = "id, service_id, service_name, service_type, secret_hash, \
     description, allowed_apis, is_active, last_used_at, created_at, updated_at";

/// PostgreSQL-backed credential store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn role_id(&self, role: &str) -> Result<i64, AuthError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM auth_roles WHERE name = $1 AND is_active")
            .bind(role)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| AuthError::NotFound(format!("Role '{}'", role)))
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn health_check(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn verify_schema(&self) -> Result<(), AuthError> {
        let required: Vec<String> = REQUIRED_TABLES.iter().map(|t| t.to_string()).collect();
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = ANY($1)",
        )
        .bind(&required)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|t| !present.iter().any(|p| p == t))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::SchemaMissing(missing.join(", ")))
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM auth_users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM auth_users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO auth_users (username, email, password_hash, status, email_verified, \
             phone_verified, created_at, updated_at) \
             VALUES ($1, $2, $3, 'active', FALSE, FALSE, NOW(), NOW()) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match db_error(e) {
            AuthError::Conflict(_) => {
                AuthError::Conflict("username or email already registered".to_string())
            }
            other => other,
        })
    }

    async fn update_last_login(&self, user_id: i64) -> Result<(), AuthError> {
        sqlx::query("UPDATE auth_users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn primary_role(&self, user_id: i64) -> Result<Option<PrimaryRole>, AuthError> {
        sqlx::query_as::<_, PrimaryRole>(
            "SELECT r.name, r.level FROM auth_user_roles ur \
             JOIN auth_roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1 AND ur.status = 'active' AND r.is_active \
             ORDER BY r.level DESC, ur.assigned_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn role_permissions(&self, role: &str) -> Result<Vec<String>, AuthError> {
        sqlx::query_scalar(
            "SELECT DISTINCT p.code FROM auth_roles r \
             JOIN auth_role_permissions rp ON rp.role_id = r.id AND rp.status = 'active' \
             JOIN auth_permissions p ON p.id = rp.permission_id \
             WHERE r.name = $1 AND r.is_active \
             ORDER BY p.code",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn all_permission_codes(&self) -> Result<Vec<String>, AuthError> {
        sqlx::query_scalar("SELECT code FROM auth_permissions ORDER BY code")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AuthError> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, level, description, is_active FROM auth_roles \
             WHERE is_active ORDER BY level",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn upsert_role(
        &self,
        name: &str,
        level: i32,
        description: &str,
    ) -> Result<Role, AuthError> {
        sqlx::query_as::<_, Role>(
            "INSERT INTO auth_roles (name, level, description, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, TRUE, NOW(), NOW()) \
             ON CONFLICT (name) DO UPDATE SET level = EXCLUDED.level, \
             description = EXCLUDED.description, updated_at = NOW() \
             RETURNING id, name, level, description, is_active",
        )
        .bind(name)
        .bind(level)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn upsert_permission(
        &self,
        seed: &PermissionSeed,
        service_name: &str,
    ) -> Result<Permission, AuthError> {
        sqlx::query_as::<_, Permission>(
            "INSERT INTO auth_permissions (code, description, resource, action, service_name, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (code) DO UPDATE SET description = EXCLUDED.description \
             RETURNING id, code, description, resource, action, service_name",
        )
        .bind(seed.code)
        .bind(seed.description)
        .bind(seed.resource)
        .bind(seed.action)
        .bind(service_name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn ensure_role_permission(&self, role: &str, code: &str) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO auth_role_permissions (role_id, permission_id, status, granted_at) \
             SELECT r.id, p.id, 'active', NOW() FROM auth_roles r, auth_permissions p \
             WHERE r.name = $1 AND p.code = $2 \
             ON CONFLICT (role_id, permission_id) DO NOTHING",
        )
        .bind(role)
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn assign_role(&self, user_id: i64, role: &str) -> Result<(), AuthError> {
        let role_id = self.role_id(role).await?;
        sqlx::query(
            "INSERT INTO auth_user_roles (user_id, role_id, status, assigned_at) \
             VALUES ($1, $2, 'active', NOW()) \
             ON CONFLICT (user_id, role_id) DO UPDATE SET status = 'active', \
             assigned_at = CASE WHEN auth_user_roles.status = 'active' \
             THEN auth_user_roles.assigned_at ELSE NOW() END",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error(e) {
            AuthError::NotFound(_) => AuthError::UserNotFound,
            other => other,
        })?;
        Ok(())
    }

    async fn revoke_role(&self, user_id: i64, role: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE auth_user_roles ur SET status = $3 FROM auth_roles r \
             WHERE r.id = ur.role_id AND ur.user_id = $1 AND r.name = $2 AND ur.status = $4",
        )
        .bind(user_id)
        .bind(role)
        .bind(AssignmentStatus::Inactive.as_str())
        .bind(AssignmentStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn grant_permission(&self, role: &str, code: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            "INSERT INTO auth_role_permissions (role_id, permission_id, status, granted_at) \
             SELECT r.id, p.id, 'active', NOW() FROM auth_roles r, auth_permissions p \
             WHERE r.name = $1 AND p.code = $2 \
             ON CONFLICT (role_id, permission_id) DO UPDATE SET status = 'active'",
        )
        .bind(role)
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!(
                "Role '{}' or permission '{}'",
                role, code
            )));
        }
        Ok(())
    }

    async fn revoke_permission(&self, role: &str, code: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE auth_role_permissions rp SET status = $3 \
             FROM auth_roles r, auth_permissions p \
             WHERE rp.role_id = r.id AND rp.permission_id = p.id \
             AND r.name = $1 AND p.code = $2 AND rp.status = $4",
        )
        .bind(role)
        .bind(code)
        .bind(AssignmentStatus::Inactive.as_str())
        .bind(AssignmentStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_access_log(&self, entry: &AccessLogEntry) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO auth_login_logs (user_id, username, login_method, success, \
             failure_reason, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())",
        )
        .bind(entry.user_id)
        .bind(&entry.username)
        .bind(&entry.action)
        .bind(entry.success)
        .bind(&entry.failure_reason)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_service(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceCredential>, AuthError> {
        sqlx::query_as::<_, ServiceCredential>(&format!(
            "SELECT {} FROM service_credentials WHERE service_id = $1",
            SERVICE_COLUMNS
        ))
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn touch_service(&self, service_id: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE service_credentials SET last_used_at = NOW() WHERE service_id = $1",
        )
        .bind(service_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn record_service_token(&self, record: &ServiceTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO service_tokens (service_id, token_hash, expires_at, created_at) \
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(&record.service_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}
