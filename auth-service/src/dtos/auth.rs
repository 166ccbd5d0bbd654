use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{RoleSummary, UserSummary};
use crate::services::{AuthenticatedUser, ValidatedIdentity};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: i64,
    pub user: UserSummary,
    pub permissions: Vec<String>,
}

impl From<AuthenticatedUser> for LoginResponse {
    fn from(auth: AuthenticatedUser) -> Self {
        Self {
            token: auth.token,
            token_type: "Bearer",
            expires_at: auth.expires_at,
            user: auth.user,
            permissions: auth.permissions,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3 to 64 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub identity: ValidatedIdentity,
}

impl From<ValidatedIdentity> for ValidateResponse {
    fn from(identity: ValidatedIdentity) -> Self {
        Self {
            success: true,
            identity,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionQuery {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,

    #[validate(length(min = 1, message = "Permission is required"))]
    pub permission: String,
}

#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub user_id: i64,
    pub permission: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserQuery {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccessRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,

    #[validate(length(min = 1, message = "Resource is required"))]
    pub resource: String,

    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub user_id: i64,
    pub permission: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,

    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,

    #[serde(default)]
    pub resource: String,

    #[validate(length(min = 1, message = "Result is required"))]
    pub result: String,

    #[serde(default, alias = "ip")]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub roles: Vec<RoleSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RolePermissionsQuery {
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RolePermissionsResponse {
    pub role: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidationResponse {
    pub invalidated_before: i64,
    pub invalidated_before_rfc3339: String,
}
