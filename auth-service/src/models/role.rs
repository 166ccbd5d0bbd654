use serde::Serialize;
use sqlx::FromRow;

pub const DEFAULT_ROLE: &str = "user";
pub const SUPER_ADMIN_ROLE: &str = "super_admin";
pub const WILDCARD_PERMISSION: &str = "*";

#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub level: i32,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Highest-level active role of a user.
#[derive(Debug, Clone, FromRow)]
pub struct PrimaryRole {
    pub name: String,
    pub level: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    pub name: String,
    pub level: i32,
    pub description: String,
}

/// Built-in role definition used for bootstrap and as the resolver fallback.
#[derive(Debug, Clone, Copy)]
pub struct StaticRole {
    pub name: &'static str,
    pub level: i32,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

impl StaticRole {
    /// A wildcard role grants every known permission, expanded on demand.
    pub fn is_wildcard(&self) -> bool {
        self.permissions == [WILDCARD_PERMISSION]
    }

    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            name: self.name.to_string(),
            level: self.level,
            description: self.description.to_string(),
        }
    }
}

pub const STATIC_ROLES: &[StaticRole] = &[
    StaticRole {
        name: "guest",
        level: 1,
        description: "Unauthenticated or trial access",
        permissions: &["read:public"],
    },
    StaticRole {
        name: "user",
        level: 2,
        description: "Regular user",
        permissions: &["read:public", "read:own", "write:own"],
    },
    StaticRole {
        name: "admin",
        level: 3,
        description: "Administrator",
        permissions: &[
            "read:public",
            "read:own",
            "write:own",
            "read:all",
            "write:all",
            "delete:own",
        ],
    },
    StaticRole {
        name: SUPER_ADMIN_ROLE,
        level: 4,
        description: "Super administrator",
        permissions: &[WILDCARD_PERMISSION],
    },
];

pub fn static_role(name: &str) -> Option<&'static StaticRole> {
    STATIC_ROLES.iter().find(|r| r.name == name)
}

/// Roles allowed to run administrative operations.
pub fn is_admin_role(name: &str) -> bool {
    name == "admin" || name == SUPER_ADMIN_ROLE
}
