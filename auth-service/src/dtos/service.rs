use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::{ServiceIdentity, ServiceSession};

#[derive(Debug, Deserialize, Validate)]
pub struct ServiceLoginRequest {
    #[validate(length(min = 1, max = 128, message = "Service ID is required"))]
    pub service_id: String,

    #[validate(length(min = 1, message = "Service secret is required"))]
    pub service_secret: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceLoginResponse {
    pub service_id: String,
    pub service_name: String,
    pub service_token: String,
    pub expires_at: i64,
    pub expires_in: i64,
    pub allowed_apis: Vec<String>,
}

impl ServiceLoginResponse {
    pub fn new(session: ServiceSession, now: i64) -> Self {
        Self {
            expires_in: (session.expires_at - now).max(0),
            service_id: session.service_id,
            service_name: session.service_name,
            service_token: session.token,
            expires_at: session.expires_at,
            allowed_apis: session.allowed_apis,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServiceValidateRequest {
    #[validate(length(min = 1, message = "Service token is required"))]
    pub service_token: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceValidateResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub service: ServiceIdentity,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServicePermissionRequest {
    #[validate(length(min = 1, max = 128, message = "Service ID is required"))]
    pub service_id: String,

    #[validate(length(min = 1, message = "API path is required"))]
    pub api_path: String,
}

#[derive(Debug, Serialize)]
pub struct ServicePermissionResponse {
    pub service_id: String,
    pub api_path: String,
    pub allowed: bool,
}
