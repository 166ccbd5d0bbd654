use serde::Serialize;
use std::sync::Arc;

use super::audit::AuditLogger;
use super::database::CredentialStore;
use super::epoch::InvalidationEpoch;
use super::error::AuthError;
use super::jwt::{RoleGrant, UserTokenService};
use super::resolver::PermissionResolver;
use crate::models::{
    is_admin_role, permission_code, static_role, AccessLogEntry, ClientInfo, NewUser,
    PrimaryRole, RoleSummary, User, UserSummary, DEFAULT_ROLE, STATIC_ROLES, SUPER_ADMIN_ROLE,
    WILDCARD_PERMISSION,
};
use crate::utils::{hash_password, verify_password, Password};

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub token: String,
    pub expires_at: i64,
    pub user: UserSummary,
    pub permissions: Vec<String>,
}

/// Identity carried by a validated user token.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedIdentity {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub level: i32,
    pub permissions: Vec<String>,
    pub expires_at: i64,
}

impl ValidatedIdentity {
    pub fn is_admin(&self) -> bool {
        is_admin_role(&self.role)
    }
}

/// User trust domain: login, token validation, permission checks and the
/// administrative operations on roles and the invalidation epoch.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    resolver: PermissionResolver,
    tokens: UserTokenService,
    epoch: InvalidationEpoch,
    audit: AuditLogger,
}

fn is_wildcard_role(role: &str) -> bool {
    static_role(role).is_some_and(|r| r.is_wildcard())
}

fn default_role() -> PrimaryRole {
    PrimaryRole {
        name: DEFAULT_ROLE.to_string(),
        level: static_role(DEFAULT_ROLE).map(|r| r.level).unwrap_or(0),
    }
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: UserTokenService,
        epoch: InvalidationEpoch,
    ) -> Self {
        Self {
            resolver: PermissionResolver::new(store.clone()),
            audit: AuditLogger::new(store.clone()),
            store,
            tokens,
            epoch,
        }
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn epoch(&self) -> &InvalidationEpoch {
        &self.epoch
    }

    async fn primary_role(&self, user_id: i64) -> Result<PrimaryRole, AuthError> {
        Ok(self
            .store
            .primary_role(user_id)
            .await?
            .unwrap_or_else(default_role))
    }

    async fn audit_failure(
        &self,
        user_id: Option<i64>,
        username: &str,
        client: &ClientInfo,
        err: AuthError,
    ) -> AuthError {
        let entry = AccessLogEntry::new(user_id, Some(username), "login")
            .failed(err.error_code())
            .from_client(client);
        self.audit.record_now(&entry).await;
        err
    }

    /// Verifies a username/password pair and issues a user token.
    #[tracing::instrument(skip(self, password, client))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: Password,
        client: &ClientInfo,
    ) -> Result<AuthenticatedUser, AuthError> {
        let user = match self.store.find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                tracing::info!("Login rejected: unknown user");
                return Err(self
                    .audit_failure(None, username, client, AuthError::UserNotFound)
                    .await);
            }
        };

        if !user.is_active() {
            tracing::info!(user_id = %user.id, "Login rejected: account disabled");
            return Err(self
                .audit_failure(Some(user.id), username, client, AuthError::UserDisabled)
                .await);
        }

        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password check aborted: {}", e)))??;

        if !matches {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(self
                .audit_failure(Some(user.id), username, client, AuthError::InvalidPassword)
                .await);
        }

        let role = self.primary_role(user.id).await?;
        let permissions = self.resolver.permissions_for(&role.name).await?;
        let issued = self.tokens.issue(
            &user,
            RoleGrant {
                role: role.name.clone(),
                level: role.level,
                permissions: permissions.clone(),
            },
            self.epoch.issue_timestamp(),
        )?;

        if let Err(e) = self.store.update_last_login(user.id).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to update last login");
        }

        self.audit
            .record_now(&AccessLogEntry::new(Some(user.id), Some(username), "login").from_client(client))
            .await;

        tracing::info!(user_id = %user.id, role = %role.name, "User authenticated");

        Ok(AuthenticatedUser {
            token: issued.token,
            expires_at: issued.expires_at,
            user: user.summary(&role.name),
            permissions,
        })
    }

    /// Signature, expiry, invalidation epoch, then current account status.
    /// Permissions come from the token snapshot.
    pub async fn validate(&self, token: &str) -> Result<ValidatedIdentity, AuthError> {
        let claims = self.tokens.verify(token)?;

        if !self.epoch.is_valid(claims.iat_ms) {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .store
            .find_user_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active() {
            return Err(AuthError::UserDisabled);
        }

        Ok(ValidatedIdentity {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
            level: claims.level,
            permissions: claims.permissions,
            expires_at: claims.exp,
        })
    }

    /// Live check against the resolver, not a token snapshot. A wildcard role
    /// passes every code, including ones missing from the catalog.
    pub async fn check_permission(&self, user_id: i64, permission: &str) -> Result<bool, AuthError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_active() {
            return Ok(false);
        }

        let role = self.primary_role(user_id).await?;
        if is_wildcard_role(&role.name) {
            return Ok(true);
        }
        let permissions = self.resolver.permissions_for(&role.name).await?;
        Ok(permissions
            .iter()
            .any(|p| p == permission || p == WILDCARD_PERMISSION))
    }

    /// Checks `action:resource` and records the decision.
    pub async fn validate_access(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
        client: &ClientInfo,
    ) -> Result<bool, AuthError> {
        let code = permission_code(resource, action);
        let allowed = self.check_permission(user_id, &code).await?;

        self.audit.record(
            AccessLogEntry::new(Some(user_id), None, format!("access:{}", code))
                .outcome(allowed)
                .from_client(client),
        );
        Ok(allowed)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserSummary, AuthError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let role = self.primary_role(user_id).await?;
        Ok(user.summary(&role.name))
    }

    /// Records an access decision reported by a business service. `result`
    /// other than `success` is stored as the failure reason.
    pub async fn log_access(
        &self,
        user_id: i64,
        action: &str,
        resource: &str,
        result: &str,
        client: &ClientInfo,
    ) {
        let username = match self.store.find_user_by_id(user_id).await {
            Ok(user) => user.map(|u| u.username),
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "Username lookup failed for access log");
                None
            }
        };
        let action = if resource.is_empty() {
            action.to_string()
        } else {
            format!("{}:{}", action, resource)
        };

        let entry = AccessLogEntry::new(Some(user_id), username.as_deref(), action).from_client(client);
        let entry = if result.eq_ignore_ascii_case("success") {
            entry
        } else {
            entry.failed(result)
        };
        self.audit.record_now(&entry).await;
    }

    /// Active roles by level. Falls back to the static catalog while the role
    /// table is still empty.
    pub async fn roles(&self) -> Result<Vec<RoleSummary>, AuthError> {
        let roles = self.store.list_roles().await?;
        if roles.is_empty() {
            return Ok(STATIC_ROLES.iter().map(|r| r.summary()).collect());
        }
        Ok(roles
            .into_iter()
            .map(|r| RoleSummary {
                name: r.name,
                level: r.level,
                description: r.description.unwrap_or_default(),
            })
            .collect())
    }

    pub async fn permissions_for_role(&self, role: &str) -> Result<Vec<String>, AuthError> {
        self.resolver.permissions_for(role).await
    }

    fn require_admin(actor: &ValidatedIdentity) -> Result<(), AuthError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(
                "administrative role required".to_string(),
            ))
        }
    }

    /// Revokes every user token issued so far. Returns the new epoch.
    pub async fn invalidate_all(
        &self,
        actor: &ValidatedIdentity,
        client: &ClientInfo,
    ) -> Result<i64, AuthError> {
        Self::require_admin(actor)?;
        let epoch = self.epoch.invalidate_all();

        tracing::warn!(
            actor_id = %actor.user_id,
            epoch_ms = epoch,
            "All user tokens invalidated"
        );
        self.audit
            .record_now(
                &AccessLogEntry::new(Some(actor.user_id), Some(&actor.username), "invalidate_all")
                    .from_client(client),
            )
            .await;
        Ok(epoch)
    }

    pub fn invalidation_time(&self) -> i64 {
        self.epoch.current()
    }

    /// Creates an active account holding the default role.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: Password,
        client: &ClientInfo,
    ) -> Result<UserSummary, AuthError> {
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password hashing aborted: {}", e)))??;

        let user: User = self
            .store
            .create_user(&NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;
        self.store.assign_role(user.id, DEFAULT_ROLE).await?;

        tracing::info!(user_id = %user.id, "User registered");
        self.audit.record(
            AccessLogEntry::new(Some(user.id), Some(username), "register").from_client(client),
        );
        Ok(user.summary(DEFAULT_ROLE))
    }

    /// Records the logout. The token itself stays valid until expiry or the
    /// next invalidation.
    pub async fn logout(&self, identity: &ValidatedIdentity, client: &ClientInfo) {
        self.audit
            .record_now(
                &AccessLogEntry::new(Some(identity.user_id), Some(&identity.username), "logout")
                    .from_client(client),
            )
            .await;
    }

    /// Wildcard roles resolve against the live catalog and never carry join
    /// rows.
    fn require_explicit_role(role: &str) -> Result<(), AuthError> {
        if is_wildcard_role(role) {
            return Err(AuthError::InvalidParams(format!(
                "{} holds every permission and takes no explicit grants",
                role
            )));
        }
        Ok(())
    }

    fn admin_entry(actor: &ValidatedIdentity, action: String, client: &ClientInfo) -> AccessLogEntry {
        AccessLogEntry::new(Some(actor.user_id), Some(&actor.username), action).from_client(client)
    }

    pub async fn assign_role(
        &self,
        actor: &ValidatedIdentity,
        user_id: i64,
        role: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        Self::require_admin(actor)?;
        if role == SUPER_ADMIN_ROLE && actor.role != SUPER_ADMIN_ROLE {
            return Err(AuthError::PermissionDenied(
                "only a super administrator can grant super_admin".to_string(),
            ));
        }
        self.store.assign_role(user_id, role).await?;

        tracing::info!(actor_id = %actor.user_id, user_id = %user_id, role = %role, "Role assigned");
        self.audit.record(Self::admin_entry(
            actor,
            format!("assign_role:{}:{}", user_id, role),
            client,
        ));
        Ok(())
    }

    pub async fn revoke_role(
        &self,
        actor: &ValidatedIdentity,
        user_id: i64,
        role: &str,
        client: &ClientInfo,
    ) -> Result<bool, AuthError> {
        Self::require_admin(actor)?;
        let revoked = self.store.revoke_role(user_id, role).await?;

        tracing::info!(actor_id = %actor.user_id, user_id = %user_id, role = %role, revoked, "Role revoked");
        self.audit.record(
            Self::admin_entry(actor, format!("revoke_role:{}:{}", user_id, role), client)
                .outcome(revoked),
        );
        Ok(revoked)
    }

    pub async fn grant_permission(
        &self,
        actor: &ValidatedIdentity,
        role: &str,
        permission: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        Self::require_admin(actor)?;
        Self::require_explicit_role(role)?;
        self.store.grant_permission(role, permission).await?;

        tracing::info!(actor_id = %actor.user_id, role = %role, permission = %permission, "Permission granted");
        self.audit.record(Self::admin_entry(
            actor,
            format!("grant_permission:{}:{}", role, permission),
            client,
        ));
        Ok(())
    }

    pub async fn revoke_permission(
        &self,
        actor: &ValidatedIdentity,
        role: &str,
        permission: &str,
        client: &ClientInfo,
    ) -> Result<bool, AuthError> {
        Self::require_admin(actor)?;
        Self::require_explicit_role(role)?;
        let revoked = self.store.revoke_permission(role, permission).await?;

        tracing::info!(actor_id = %actor.user_id, role = %role, permission = %permission, revoked, "Permission revoked");
        self.audit.record(
            Self::admin_entry(actor, format!("revoke_permission:{}:{}", role, permission), client)
                .outcome(revoked),
        );
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;
    use crate::services::{bootstrap, MockCredentialStore};
    use chrono::Duration;

    const SECRET: &str = "user-domain-secret-with-32-bytes!!";

    async fn setup() -> (Arc<MockCredentialStore>, AuthService) {
        let store = Arc::new(MockCredentialStore::new());
        bootstrap::seed_catalog(store.as_ref(), "auth-service")
            .await
            .unwrap();
        let auth = AuthService::new(
            store.clone(),
            UserTokenService::new(SECRET, "auth-service", Duration::hours(1)),
            InvalidationEpoch::new(),
        );
        (store, auth)
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("test".to_string()),
        }
    }

    #[tokio::test]
    async fn login_then_validate_round_trips_identity() {
        let (store, auth) = setup().await;
        let alice = store.add_user("alice", "pa55word!", Some("user")).unwrap();

        let login = auth
            .authenticate("alice", Password::new("pa55word!"), &client())
            .await
            .unwrap();
        assert_eq!(login.user.id, alice.id);
        assert_eq!(login.user.role, "user");
        assert!(!login.permissions.is_empty());

        let identity = auth.validate(&login.token).await.unwrap();
        assert_eq!(identity.user_id, alice.id);
        assert_eq!(identity.permissions, login.permissions);

        let logs = store.access_logs();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].success);
        assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn each_failure_kind_is_classified_and_audited() {
        let (store, auth) = setup().await;
        let bob = store.add_user("bob", "right", Some("user")).unwrap();

        assert!(matches!(
            auth.authenticate("nobody", Password::new("x"), &client()).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            auth.authenticate("bob", Password::new("righ"), &client()).await,
            Err(AuthError::InvalidPassword)
        ));
        store.set_user_status(bob.id, UserStatus::Disabled).unwrap();
        assert!(matches!(
            auth.authenticate("bob", Password::new("right"), &client()).await,
            Err(AuthError::UserDisabled)
        ));

        let reasons: Vec<_> = store
            .access_logs()
            .into_iter()
            .map(|l| l.failure_reason.unwrap_or_default())
            .collect();
        assert_eq!(reasons, vec!["USER_NOT_FOUND", "INVALID_PASSWORD", "USER_DISABLED"]);
    }

    #[tokio::test]
    async fn audit_failure_does_not_block_login() {
        let (store, auth) = setup().await;
        store.add_user("carol", "secret-pass", Some("user")).unwrap();
        store.fail_audit_writes(true);

        assert!(auth
            .authenticate("carol", Password::new("secret-pass"), &client())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn user_without_assignment_gets_default_role() {
        let (store, auth) = setup().await;
        store.add_user("dave", "secret-pass", None).unwrap();

        let login = auth
            .authenticate("dave", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        assert_eq!(login.user.role, DEFAULT_ROLE);
    }

    #[tokio::test]
    async fn highest_level_role_is_primary() {
        let (store, auth) = setup().await;
        let erin = store.add_user("erin", "secret-pass", Some("user")).unwrap();
        store.assign_role(erin.id, "admin").await.unwrap();

        let login = auth
            .authenticate("erin", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        assert_eq!(login.user.role, "admin");
        assert!(login.permissions.contains(&"read:all".to_string()));
    }

    #[tokio::test]
    async fn disabling_a_user_invalidates_their_tokens() {
        let (store, auth) = setup().await;
        let frank = store.add_user("frank", "secret-pass", Some("user")).unwrap();
        let login = auth
            .authenticate("frank", Password::new("secret-pass"), &client())
            .await
            .unwrap();

        store.set_user_status(frank.id, UserStatus::Disabled).unwrap();
        assert!(matches!(
            auth.validate(&login.token).await,
            Err(AuthError::UserDisabled)
        ));
    }

    #[tokio::test]
    async fn invalidate_all_requires_admin_and_revokes_older_tokens() {
        let (store, auth) = setup().await;
        store.add_user("grace", "secret-pass", Some("user")).unwrap();
        store.add_user("root", "secret-pass", Some("super_admin")).unwrap();

        let user_login = auth
            .authenticate("grace", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        let admin_login = auth
            .authenticate("root", Password::new("secret-pass"), &client())
            .await
            .unwrap();

        let user_identity = auth.validate(&user_login.token).await.unwrap();
        assert!(matches!(
            auth.invalidate_all(&user_identity, &client()).await,
            Err(AuthError::PermissionDenied(_))
        ));

        let admin_identity = auth.validate(&admin_login.token).await.unwrap();
        let epoch = auth.invalidate_all(&admin_identity, &client()).await.unwrap();
        assert_eq!(auth.invalidation_time(), epoch);

        assert!(matches!(
            auth.validate(&user_login.token).await,
            Err(AuthError::TokenRevoked)
        ));

        let fresh = auth
            .authenticate("grace", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        assert!(auth.validate(&fresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn check_permission_uses_live_grants() {
        let (store, auth) = setup().await;
        let heidi = store.add_user("heidi", "secret-pass", Some("user")).unwrap();

        assert!(auth.check_permission(heidi.id, "read:own").await.unwrap());
        assert!(!auth.check_permission(heidi.id, "read:all").await.unwrap());

        store.grant_permission("user", "read:all").await.unwrap();
        assert!(auth.check_permission(heidi.id, "read:all").await.unwrap());

        assert!(auth
            .validate_access(heidi.id, "own", "write", &client())
            .await
            .unwrap());
        assert!(matches!(
            auth.check_permission(9999, "read:own").await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn register_assigns_default_role() {
        let (store, auth) = setup().await;
        let created = auth
            .register("ivan", "ivan@example.com", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        assert_eq!(created.role, DEFAULT_ROLE);
        assert_eq!(store.user_role_rows(created.id), 1);

        assert!(matches!(
            auth.register("ivan", "other@example.com", Password::new("x"), &client())
                .await,
            Err(AuthError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn plain_admin_cannot_grant_super_admin() {
        let (store, auth) = setup().await;
        store.add_user("judy", "secret-pass", Some("admin")).unwrap();
        let target = store.add_user("ken", "secret-pass", Some("user")).unwrap();

        let login = auth
            .authenticate("judy", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        let judy = auth.validate(&login.token).await.unwrap();

        assert!(matches!(
            auth.assign_role(&judy, target.id, SUPER_ADMIN_ROLE, &client()).await,
            Err(AuthError::PermissionDenied(_))
        ));
        auth.assign_role(&judy, target.id, "admin", &client())
            .await
            .unwrap();
        assert_eq!(auth.get_user(target.id).await.unwrap().role, "admin");
    }

    #[tokio::test]
    async fn super_admin_passes_codes_outside_the_catalog() {
        let (store, auth) = setup().await;
        let root = store.add_user("root", "secret-pass", Some("super_admin")).unwrap();
        let heidi = store.add_user("heidi", "secret-pass", Some("user")).unwrap();

        assert!(auth.check_permission(root.id, "resume:view").await.unwrap());
        assert!(auth.check_permission(root.id, "admin:system").await.unwrap());
        assert!(!auth.check_permission(heidi.id, "resume:view").await.unwrap());

        store.set_user_status(root.id, UserStatus::Disabled).unwrap();
        assert!(!auth.check_permission(root.id, "admin:system").await.unwrap());
    }

    #[tokio::test]
    async fn wildcard_role_refuses_explicit_grants() {
        let (store, auth) = setup().await;
        let root = store.add_user("root", "secret-pass", Some("super_admin")).unwrap();
        let login = auth
            .authenticate("root", Password::new("secret-pass"), &client())
            .await
            .unwrap();
        let actor = auth.validate(&login.token).await.unwrap();

        assert!(matches!(
            auth.grant_permission(&actor, SUPER_ADMIN_ROLE, "read:public", &client())
                .await,
            Err(AuthError::InvalidParams(_))
        ));
        assert!(matches!(
            auth.revoke_permission(&actor, SUPER_ADMIN_ROLE, "read:public", &client())
                .await,
            Err(AuthError::InvalidParams(_))
        ));
        assert_eq!(store.role_permission_rows(SUPER_ADMIN_ROLE), 0);

        let resolved = auth.permissions_for_role(SUPER_ADMIN_ROLE).await.unwrap();
        assert_eq!(resolved.len(), crate::models::BOOTSTRAP_PERMISSIONS.len());
        assert!(auth.check_permission(root.id, "admin:system").await.unwrap());
    }
}
