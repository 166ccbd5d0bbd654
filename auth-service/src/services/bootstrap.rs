//! Startup seeding of the role and permission catalog.
//!
//! Every step is an upsert or insert-if-absent, so running it on each start
//! is safe. Wildcard roles get no join rows.

use super::database::CredentialStore;
use super::error::AuthError;
use crate::config::BootstrapConfig;
use crate::models::{NewUser, BOOTSTRAP_PERMISSIONS, STATIC_ROLES, SUPER_ADMIN_ROLE};
use crate::utils::{hash_password, Password};

/// Fails fast when a required table is missing, then seeds the catalog and
/// the optional super administrator.
pub async fn run(
    store: &dyn CredentialStore,
    config: &BootstrapConfig,
    service_name: &str,
) -> Result<(), AuthError> {
    store.verify_schema().await?;
    seed_catalog(store, service_name).await?;
    ensure_super_admin(store, config).await?;
    Ok(())
}

pub async fn seed_catalog(store: &dyn CredentialStore, service_name: &str) -> Result<(), AuthError> {
    for role in STATIC_ROLES {
        store
            .upsert_role(role.name, role.level, role.description)
            .await?;
    }

    for seed in BOOTSTRAP_PERMISSIONS {
        store.upsert_permission(seed, service_name).await?;
    }

    let mut grants = 0;
    for role in STATIC_ROLES.iter().filter(|r| !r.is_wildcard()) {
        for code in role.permissions {
            store.ensure_role_permission(role.name, code).await?;
            grants += 1;
        }
    }

    tracing::info!(
        roles = STATIC_ROLES.len(),
        permissions = BOOTSTRAP_PERMISSIONS.len(),
        grants,
        "Role catalog seeded"
    );
    Ok(())
}

async fn ensure_super_admin(
    store: &dyn CredentialStore,
    config: &BootstrapConfig,
) -> Result<(), AuthError> {
    let Some(password) = config.admin_password.as_deref() else {
        tracing::info!("No bootstrap admin password configured, skipping default admin");
        return Ok(());
    };

    if let Some(existing) = store.find_user_by_username(&config.admin_username).await? {
        tracing::info!(user_id = %existing.id, "Bootstrap admin already exists");
        return Ok(());
    }

    let password = Password::new(password);
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Password hashing aborted: {}", e)))??;

    let admin = store
        .create_user(&NewUser {
            username: config.admin_username.clone(),
            email: config.admin_email.clone(),
            password_hash,
        })
        .await?;
    store.assign_role(admin.id, SUPER_ADMIN_ROLE).await?;

    tracing::info!(user_id = %admin.id, username = %admin.username, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockCredentialStore;

    fn config(password: Option<&str>) -> BootstrapConfig {
        BootstrapConfig {
            admin_username: "root".to_string(),
            admin_email: "root@example.com".to_string(),
            admin_password: password.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn seeding_twice_leaves_one_row_per_grant() {
        let store = MockCredentialStore::new();
        run(&store, &config(None), "auth-service").await.unwrap();
        run(&store, &config(None), "auth-service").await.unwrap();

        assert_eq!(store.role_permission_rows("user"), 3);
        assert_eq!(store.role_permission_rows("admin"), 6);
        assert_eq!(store.role_permission_rows(SUPER_ADMIN_ROLE), 0);
        assert_eq!(store.list_roles().await.unwrap().len(), STATIC_ROLES.len());
    }

    #[tokio::test]
    async fn reseeding_keeps_soft_revoked_grants_revoked() {
        let store = MockCredentialStore::new();
        seed_catalog(&store, "auth-service").await.unwrap();
        assert!(store.revoke_permission("user", "write:own").await.unwrap());

        seed_catalog(&store, "auth-service").await.unwrap();
        let codes = store.role_permissions("user").await.unwrap();
        assert!(!codes.contains(&"write:own".to_string()));
    }

    #[tokio::test]
    async fn missing_table_stops_startup() {
        let store = MockCredentialStore::new();
        store.drop_table("auth_user_roles");
        match run(&store, &config(None), "auth-service").await {
            Err(AuthError::SchemaMissing(tables)) => assert_eq!(tables, "auth_user_roles"),
            other => panic!("expected SchemaMissing, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn admin_is_created_once() {
        let store = MockCredentialStore::new();
        run(&store, &config(Some("bootstrap-pass")), "auth-service")
            .await
            .unwrap();
        run(&store, &config(Some("bootstrap-pass")), "auth-service")
            .await
            .unwrap();

        let admin = store.find_user_by_username("root").await.unwrap().unwrap();
        let role = store.primary_role(admin.id).await.unwrap().unwrap();
        assert_eq!(role.name, SUPER_ADMIN_ROLE);
        assert_eq!(store.user_role_rows(admin.id), 1);
    }
}
