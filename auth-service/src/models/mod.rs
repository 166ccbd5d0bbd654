//! Data models for auth-service.

mod access_log;
mod assignment;
mod permission;
mod role;
mod service_credential;
mod user;

pub use access_log::{AccessLogEntry, ClientInfo};
pub use assignment::AssignmentStatus;
pub use permission::{permission_code, Permission, PermissionSeed, BOOTSTRAP_PERMISSIONS};
pub use role::{
    is_admin_role, static_role, PrimaryRole, Role, RoleSummary, StaticRole, DEFAULT_ROLE,
    STATIC_ROLES, SUPER_ADMIN_ROLE, WILDCARD_PERMISSION,
};
pub use service_credential::{ServiceCredential, ServiceTokenRecord};
pub use user::{NewUser, User, UserStatus, UserSummary};
