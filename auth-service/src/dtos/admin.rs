use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UserRoleRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,

    #[validate(length(min = 1, max = 64, message = "Role is required"))]
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RolePermissionRequest {
    #[validate(length(min = 1, max = 64, message = "Role is required"))]
    pub role: String,

    #[validate(length(min = 1, max = 128, message = "Permission is required"))]
    pub permission: String,
}

/// `changed` is false when a revoke found nothing active.
#[derive(Debug, Serialize)]
pub struct AdminChangeResponse {
    pub changed: bool,
}
