use serde::Serialize;

/// Enforcement mechanisms a storage engine offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityProfile {
    pub row_level_security: bool,
    pub roles: bool,
    pub views: bool,
    pub functions: bool,
    pub triggers: bool,
    pub json: bool,
    pub arrays: bool,
}

/// How an [`AccessHandle`](super::AccessHandle) enforces permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// Switch to the caller's database role; installed policies filter rows.
    NativeRowSecurity,
    /// Inject per-resource predicates and gate writes in the application.
    ApplicationFilter,
}

impl CapabilityProfile {
    pub const POSTGRES: Self = Self {
        row_level_security: true,
        roles: true,
        views: true,
        functions: true,
        triggers: true,
        json: true,
        arrays: true,
    };

    pub const MONGODB: Self = Self {
        row_level_security: false,
        roles: true,
        views: true,
        functions: false,
        triggers: false,
        json: true,
        arrays: true,
    };

    pub const NONE: Self = Self {
        row_level_security: false,
        roles: false,
        views: false,
        functions: false,
        triggers: false,
        json: false,
        arrays: false,
    };

    /// Native enforcement needs both row policies and a role to switch to.
    pub fn enforcement(&self) -> Enforcement {
        if self.row_level_security && self.roles {
            Enforcement::NativeRowSecurity
        } else {
            Enforcement::ApplicationFilter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforcement_follows_flags() {
        assert_eq!(
            CapabilityProfile::POSTGRES.enforcement(),
            Enforcement::NativeRowSecurity
        );
        assert_eq!(
            CapabilityProfile::MONGODB.enforcement(),
            Enforcement::ApplicationFilter
        );

        let rls_without_roles = CapabilityProfile {
            roles: false,
            ..CapabilityProfile::POSTGRES
        };
        assert_eq!(
            rls_without_roles.enforcement(),
            Enforcement::ApplicationFilter
        );
    }
}
