use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

use super::database::{CredentialStore, REQUIRED_TABLES};
use super::error::AuthError;
use crate::models::{
    AccessLogEntry, AssignmentStatus, NewUser, Permission, PermissionSeed, PrimaryRole, Role,
    ServiceCredential, ServiceTokenRecord, User, UserStatus,
};
use crate::utils::{hash_password, Password};

struct Assignment {
    user_id: i64,
    role_id: i64,
    status: AssignmentStatus,
    seq: u64,
}

struct Grant {
    role_id: i64,
    permission_id: i64,
    status: AssignmentStatus,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    grants: Vec<Grant>,
    assignments: Vec<Assignment>,
    access_logs: Vec<AccessLogEntry>,
    services: Vec<ServiceCredential>,
    service_tokens: Vec<ServiceTokenRecord>,
    dropped_tables: Vec<String>,
    fail_audit: bool,
    unavailable: bool,
    next_id: i64,
    seq: u64,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name && r.is_active)
    }

    fn permission_id(&self, code: &str) -> Option<i64> {
        self.permissions.iter().find(|p| p.code == code).map(|p| p.id)
    }
}

/// In-memory credential store for tests and local runs without PostgreSQL.
/// Mirrors the soft-delete and upsert semantics of [`super::Database`].
#[derive(Default)]
pub struct MockCredentialStore {
    state: Mutex<State>,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, AuthError> {
        self.state
            .lock()
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }

    /// Creates an active user and, when given, assigns `role`.
    pub fn add_user(
        &self,
        username: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(&Password::new(password))?;
        let mut state = self.state()?;
        let id = state.id();
        let now = Utc::now();
        let user = User {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash,
            status: UserStatus::Active.as_str().to_string(),
            email_verified: false,
            phone_verified: false,
            subscription_type: None,
            subscription_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());

        if let Some(role) = role {
            let role_id = state
                .role(role)
                .map(|r| r.id)
                .ok_or_else(|| AuthError::NotFound(format!("Role '{}'", role)))?;
            let seq = state.tick();
            state.assignments.push(Assignment {
                user_id: id,
                role_id,
                status: AssignmentStatus::Active,
                seq,
            });
        }
        Ok(user)
    }

    pub fn set_user_status(&self, user_id: i64, status: UserStatus) -> Result<(), AuthError> {
        let mut state = self.state()?;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::UserNotFound)?;
        user.status = status.as_str().to_string();
        Ok(())
    }

    pub fn add_service(
        &self,
        service_id: &str,
        secret: &str,
        allowed_apis: &[&str],
    ) -> Result<ServiceCredential, AuthError> {
        let secret_hash = hash_password(&Password::new(secret))?;
        let mut state = self.state()?;
        let id = state.id();
        let now = Utc::now();
        let service = ServiceCredential {
            id,
            service_id: service_id.to_string(),
            service_name: service_id.to_string(),
            service_type: "internal".to_string(),
            secret_hash,
            description: None,
            allowed_apis: allowed_apis.iter().map(|s| s.to_string()).collect(),
            is_active: true,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };
        state.services.push(service.clone());
        Ok(service)
    }

    pub fn set_service_active(&self, service_id: &str, active: bool) -> Result<(), AuthError> {
        let mut state = self.state()?;
        let service = state
            .services
            .iter_mut()
            .find(|s| s.service_id == service_id)
            .ok_or(AuthError::ServiceNotFound)?;
        service.is_active = active;
        Ok(())
    }

    pub fn access_logs(&self) -> Vec<AccessLogEntry> {
        self.state()
            .map(|s| s.access_logs.clone())
            .unwrap_or_default()
    }

    pub fn service_tokens(&self) -> Vec<ServiceTokenRecord> {
        self.state()
            .map(|s| s.service_tokens.clone())
            .unwrap_or_default()
    }

    /// Assignment rows for a user, active or not.
    pub fn user_role_rows(&self, user_id: i64) -> usize {
        self.state()
            .map(|s| s.assignments.iter().filter(|a| a.user_id == user_id).count())
            .unwrap_or(0)
    }

    /// Grant rows for a role, active or not.
    pub fn role_permission_rows(&self, role: &str) -> usize {
        self.state()
            .map(|s| match s.roles.iter().find(|r| r.name == role) {
                Some(r) => s.grants.iter().filter(|g| g.role_id == r.id).count(),
                None => 0,
            })
            .unwrap_or(0)
    }

    pub fn fail_audit_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state() {
            state.fail_audit = fail;
        }
    }

    /// Every query fails as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state() {
            state.unavailable = unavailable;
        }
    }

    pub fn drop_table(&self, table: &str) {
        if let Ok(mut state) = self.state() {
            state.dropped_tables.push(table.to_string());
        }
    }

    fn available(&self) -> Result<MutexGuard<'_, State>, AuthError> {
        let state = self.state()?;
        if state.unavailable {
            return Err(AuthError::Internal(anyhow::anyhow!("connection refused")));
        }
        Ok(state)
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn health_check(&self) -> Result<(), AuthError> {
        self.available().map(|_| ())
    }

    async fn verify_schema(&self) -> Result<(), AuthError> {
        let state = self.available()?;
        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|t| state.dropped_tables.iter().any(|d| d == t))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::SchemaMissing(missing.join(", ")))
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let state = self.available()?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        let state = self.available()?;
        Ok(state.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, AuthError> {
        let mut state = self.available()?;
        if state
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AuthError::Conflict(
                "username or email already registered".to_string(),
            ));
        }
        let id = state.id();
        let now = Utc::now();
        let created = User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            status: UserStatus::Active.as_str().to_string(),
            email_verified: false,
            phone_verified: false,
            subscription_type: None,
            subscription_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn update_last_login(&self, user_id: i64) -> Result<(), AuthError> {
        let mut state = self.available()?;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn primary_role(&self, user_id: i64) -> Result<Option<PrimaryRole>, AuthError> {
        let state = self.available()?;
        let best = state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id && a.status == AssignmentStatus::Active)
            .filter_map(|a| {
                state
                    .roles
                    .iter()
                    .find(|r| r.id == a.role_id && r.is_active)
                    .map(|r| (r, a.seq))
            })
            .max_by_key(|(r, seq)| (r.level, *seq));
        Ok(best.map(|(r, _)| PrimaryRole {
            name: r.name.clone(),
            level: r.level,
        }))
    }

    async fn role_permissions(&self, role: &str) -> Result<Vec<String>, AuthError> {
        let state = self.available()?;
        let Some(role) = state.role(role) else {
            return Ok(Vec::new());
        };
        let mut codes: Vec<String> = state
            .grants
            .iter()
            .filter(|g| g.role_id == role.id && g.status == AssignmentStatus::Active)
            .filter_map(|g| state.permissions.iter().find(|p| p.id == g.permission_id))
            .map(|p| p.code.clone())
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    async fn all_permission_codes(&self) -> Result<Vec<String>, AuthError> {
        let state = self.available()?;
        let mut codes: Vec<String> = state.permissions.iter().map(|p| p.code.clone()).collect();
        codes.sort();
        Ok(codes)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AuthError> {
        let state = self.available()?;
        let mut roles: Vec<Role> = state.roles.iter().filter(|r| r.is_active).cloned().collect();
        roles.sort_by_key(|r| r.level);
        Ok(roles)
    }

    async fn upsert_role(
        &self,
        name: &str,
        level: i32,
        description: &str,
    ) -> Result<Role, AuthError> {
        let mut state = self.available()?;
        if let Some(existing) = state.roles.iter_mut().find(|r| r.name == name) {
            existing.level = level;
            existing.description = Some(description.to_string());
            return Ok(existing.clone());
        }
        let id = state.id();
        let role = Role {
            id,
            name: name.to_string(),
            level,
            description: Some(description.to_string()),
            is_active: true,
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn upsert_permission(
        &self,
        seed: &PermissionSeed,
        service_name: &str,
    ) -> Result<Permission, AuthError> {
        let mut state = self.available()?;
        if let Some(existing) = state.permissions.iter_mut().find(|p| p.code == seed.code) {
            existing.description = Some(seed.description.to_string());
            return Ok(existing.clone());
        }
        let id = state.id();
        let permission = Permission {
            id,
            code: seed.code.to_string(),
            description: Some(seed.description.to_string()),
            resource: seed.resource.to_string(),
            action: seed.action.to_string(),
            service_name: service_name.to_string(),
        };
        state.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn ensure_role_permission(&self, role: &str, code: &str) -> Result<(), AuthError> {
        let mut state = self.available()?;
        let (Some(role_id), Some(permission_id)) =
            (state.role(role).map(|r| r.id), state.permission_id(code))
        else {
            return Ok(());
        };
        if !state
            .grants
            .iter()
            .any(|g| g.role_id == role_id && g.permission_id == permission_id)
        {
            state.grants.push(Grant {
                role_id,
                permission_id,
                status: AssignmentStatus::Active,
            });
        }
        Ok(())
    }

    async fn assign_role(&self, user_id: i64, role: &str) -> Result<(), AuthError> {
        let mut state = self.available()?;
        let role_id = state
            .role(role)
            .map(|r| r.id)
            .ok_or_else(|| AuthError::NotFound(format!("Role '{}'", role)))?;
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(AuthError::UserNotFound);
        }
        let seq = state.tick();
        match state
            .assignments
            .iter_mut()
            .find(|a| a.user_id == user_id && a.role_id == role_id)
        {
            Some(existing) => {
                if existing.status != AssignmentStatus::Active {
                    existing.status = AssignmentStatus::Active;
                    existing.seq = seq;
                }
            }
            None => state.assignments.push(Assignment {
                user_id,
                role_id,
                status: AssignmentStatus::Active,
                seq,
            }),
        }
        Ok(())
    }

    async fn revoke_role(&self, user_id: i64, role: &str) -> Result<bool, AuthError> {
        let mut state = self.available()?;
        let Some(role_id) = state.roles.iter().find(|r| r.name == role).map(|r| r.id) else {
            return Ok(false);
        };
        match state.assignments.iter_mut().find(|a| {
            a.user_id == user_id && a.role_id == role_id && a.status == AssignmentStatus::Active
        }) {
            Some(assignment) => {
                assignment.status = AssignmentStatus::Inactive;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn grant_permission(&self, role: &str, code: &str) -> Result<(), AuthError> {
        let mut state = self.available()?;
        let (Some(role_id), Some(permission_id)) =
            (state.role(role).map(|r| r.id), state.permission_id(code))
        else {
            return Err(AuthError::NotFound(format!(
                "Role '{}' or permission '{}'",
                role, code
            )));
        };
        match state
            .grants
            .iter_mut()
            .find(|g| g.role_id == role_id && g.permission_id == permission_id)
        {
            Some(existing) => existing.status = AssignmentStatus::Active,
            None => state.grants.push(Grant {
                role_id,
                permission_id,
                status: AssignmentStatus::Active,
            }),
        }
        Ok(())
    }

    async fn revoke_permission(&self, role: &str, code: &str) -> Result<bool, AuthError> {
        let mut state = self.available()?;
        let (Some(role_id), Some(permission_id)) = (
            state.roles.iter().find(|r| r.name == role).map(|r| r.id),
            state.permission_id(code),
        ) else {
            return Ok(false);
        };
        match state.grants.iter_mut().find(|g| {
            g.role_id == role_id
                && g.permission_id == permission_id
                && g.status == AssignmentStatus::Active
        }) {
            Some(grant) => {
                grant.status = AssignmentStatus::Inactive;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_access_log(&self, entry: &AccessLogEntry) -> Result<(), AuthError> {
        let mut state = self.available()?;
        if state.fail_audit {
            return Err(AuthError::SchemaMissing("auth_login_logs".to_string()));
        }
        state.access_logs.push(entry.clone());
        Ok(())
    }

    async fn find_service(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceCredential>, AuthError> {
        let state = self.available()?;
        Ok(state
            .services
            .iter()
            .find(|s| s.service_id == service_id)
            .cloned())
    }

    async fn touch_service(&self, service_id: &str) -> Result<(), AuthError> {
        let mut state = self.available()?;
        if let Some(service) = state.services.iter_mut().find(|s| s.service_id == service_id) {
            service.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_service_token(&self, record: &ServiceTokenRecord) -> Result<(), AuthError> {
        let mut state = self.available()?;
        state.service_tokens.push(record.clone());
        Ok(())
    }
}
