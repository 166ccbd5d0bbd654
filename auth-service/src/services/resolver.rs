use std::sync::Arc;

use super::database::CredentialStore;
use super::error::AuthError;
use crate::models::static_role;

/// Role to permission-code resolution.
///
/// The join tables are authoritative. When they yield nothing for a role the
/// static role table is consulted, and a wildcard role expands to every code
/// in the permission catalog at that moment.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn CredentialStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn permissions_for(&self, role: &str) -> Result<Vec<String>, AuthError> {
        let granted = self.store.role_permissions(role).await?;
        if !granted.is_empty() {
            return Ok(granted);
        }
        self.fallback_permissions(role).await
    }

    /// Static-table path. Unknown roles resolve to nothing.
    pub async fn fallback_permissions(&self, role: &str) -> Result<Vec<String>, AuthError> {
        let Some(definition) = static_role(role) else {
            tracing::debug!(role = %role, "No grants and no static definition for role");
            return Ok(Vec::new());
        };

        if definition.is_wildcard() {
            return self.store.all_permission_codes().await;
        }

        Ok(definition
            .permissions
            .iter()
            .map(|code| code.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PermissionSeed, BOOTSTRAP_PERMISSIONS};
    use crate::services::MockCredentialStore;

    async fn store_with_catalog() -> Arc<MockCredentialStore> {
        let store = Arc::new(MockCredentialStore::new());
        for seed in BOOTSTRAP_PERMISSIONS {
            store.upsert_permission(seed, "auth-service").await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn join_rows_win_over_static_table() {
        let store = store_with_catalog().await;
        store.upsert_role("user", 2, "Regular user").await.unwrap();
        store.grant_permission("user", "read:all").await.unwrap();

        let resolver = PermissionResolver::new(store);
        assert_eq!(resolver.permissions_for("user").await.unwrap(), vec!["read:all"]);
    }

    #[tokio::test]
    async fn empty_join_falls_back_to_static_list() {
        let resolver = PermissionResolver::new(store_with_catalog().await);
        assert_eq!(
            resolver.permissions_for("user").await.unwrap(),
            vec!["read:public", "read:own", "write:own"]
        );
        assert!(resolver.permissions_for("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wildcard_sees_permissions_added_later() {
        let store = store_with_catalog().await;
        let resolver = PermissionResolver::new(store.clone());
        let before = resolver.permissions_for("super_admin").await.unwrap();
        assert_eq!(before.len(), BOOTSTRAP_PERMISSIONS.len());

        let seed = PermissionSeed {
            code: "export:reports",
            resource: "reports",
            action: "export",
            description: "Export reports",
        };
        store.upsert_permission(&seed, "report-service").await.unwrap();

        let after = resolver.permissions_for("super_admin").await.unwrap();
        assert!(after.contains(&"export:reports".to_string()));
        assert!(!after.contains(&"*".to_string()));
    }
}
