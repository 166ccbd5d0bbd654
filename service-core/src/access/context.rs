use std::collections::BTreeSet;

/// Database role used for the role switch when the caller names none.
pub const DEFAULT_DATABASE_ROLE: &str = "app_user";

const WILDCARD: &str = "*";
const SUPER_ADMIN: &str = "super_admin";

/// The resolved identity a data access handle acts for.
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    pub user_id: i64,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
    pub database_role: Option<String>,
    /// Tenants the caller belongs to, for enterprise-scoped rows.
    pub enterprise_ids: Vec<i64>,
}

impl AccessContext {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_database_role(mut self, role: impl Into<String>) -> Self {
        self.database_role = Some(role.into());
        self
    }

    pub fn with_enterprises(mut self, enterprise_ids: Vec<i64>) -> Self {
        self.enterprise_ids = enterprise_ids;
        self
    }

    pub fn is_super_admin(&self) -> bool {
        self.roles.iter().any(|r| r == SUPER_ADMIN)
    }

    /// Exact code match, the `*` grant, or the super admin role.
    pub fn has_permission(&self, code: &str) -> bool {
        self.is_super_admin()
            || self.permissions.contains(WILDCARD)
            || self.permissions.contains(code)
    }

    pub fn database_role(&self) -> &str {
        self.database_role
            .as_deref()
            .unwrap_or(DEFAULT_DATABASE_ROLE)
    }
}
