use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Permission {
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    pub resource: String,
    pub action: String,
    pub service_name: String,
}

/// Permission catalog entry created at startup.
#[derive(Debug, Clone, Copy)]
pub struct PermissionSeed {
    pub code: &'static str,
    pub resource: &'static str,
    pub action: &'static str,
    pub description: &'static str,
}

pub const BOOTSTRAP_PERMISSIONS: &[PermissionSeed] = &[
    PermissionSeed { code: "read:public", resource: "public", action: "read", description: "Read public content" },
    PermissionSeed { code: "read:own", resource: "own", action: "read", description: "Read own data" },
    PermissionSeed { code: "write:own", resource: "own", action: "write", description: "Modify own data" },
    PermissionSeed { code: "read:all", resource: "all", action: "read", description: "Read all data" },
    PermissionSeed { code: "write:all", resource: "all", action: "write", description: "Modify all data" },
    PermissionSeed { code: "delete:own", resource: "own", action: "delete", description: "Delete own data" },
    PermissionSeed { code: "delete:all", resource: "all", action: "delete", description: "Delete any data" },
    PermissionSeed { code: "admin:users", resource: "users", action: "admin", description: "Manage users" },
    PermissionSeed { code: "admin:system", resource: "system", action: "admin", description: "Manage the system" },
];

/// Permission code checked for an access request: `action:resource`.
pub fn permission_code(resource: &str, action: &str) -> String {
    format!("{}:{}", action, resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STATIC_ROLES;

    #[test]
    fn access_code_puts_action_first() {
        assert_eq!(permission_code("own", "read"), "read:own");
    }

    #[test]
    fn static_roles_only_reference_catalog_codes() {
        for role in STATIC_ROLES.iter().filter(|r| !r.is_wildcard()) {
            for code in role.permissions {
                assert!(
                    BOOTSTRAP_PERMISSIONS.iter().any(|p| p.code == *code),
                    "{} grants unknown permission {}",
                    role.name,
                    code
                );
            }
        }
    }

    #[test]
    fn seeds_are_consistent() {
        for seed in BOOTSTRAP_PERMISSIONS {
            assert_eq!(seed.code, permission_code(seed.resource, seed.action));
        }
    }
}
