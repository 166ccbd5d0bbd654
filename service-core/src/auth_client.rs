//! HTTP client for the auth service, used by business services.
//!
//! Every call carries the timeout configured on the client. Service
//! registration goes through [`AuthClient::handshake_or_continue`], which
//! never fails startup.

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::access::AccessContext;
use crate::response::{codes, ApiResponse};

pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";

#[derive(Debug, Error)]
pub enum AuthClientError {
    #[error("Auth service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Auth service rejected the call: {error_code} ({code}): {message}")]
    Rejected {
        code: i32,
        error_code: String,
        message: String,
    },

    #[error("Auth service returned an empty payload")]
    EmptyPayload,

    #[error("Unexpected auth service payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Identity returned by user token validation.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenIdentity {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub level: i32,
    pub permissions: Vec<String>,
    pub expires_at: i64,
}

impl TokenIdentity {
    pub fn access_context(&self) -> AccessContext {
        AccessContext::new(self.user_id, self.username.clone())
            .with_roles([self.role.clone()])
            .with_permissions(self.permissions.iter().cloned())
    }
}

/// A service token obtained through the handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSession {
    #[serde(rename = "service_token")]
    pub token: String,
    pub expires_at: i64,
    pub service_id: String,
    #[serde(default)]
    pub allowed_apis: Vec<String>,
}

#[derive(Deserialize)]
struct PermissionDecision {
    allowed: bool,
}

#[derive(Serialize)]
struct ValidateBody<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct ServiceLoginBody<'a> {
    service_id: &'a str,
    service_secret: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl AuthClient {
    pub fn new(config: AuthClientConfig) -> Result<Self, AuthClientError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    /// Same client with a different per-call deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AuthClientError> {
        let envelope: ApiResponse<serde_json::Value> = request
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if envelope.code != codes::SUCCESS {
            let error_code = envelope
                .data
                .as_ref()
                .and_then(|d| d.get("error_code"))
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            return Err(AuthClientError::Rejected {
                code: envelope.code,
                error_code,
                message: envelope.message,
            });
        }

        let data = envelope.data.ok_or(AuthClientError::EmptyPayload)?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn validate_token(&self, token: &str) -> Result<TokenIdentity, AuthClientError> {
        let request = self
            .http
            .post(self.url("/api/v1/auth/validate"))
            .json(&ValidateBody { token });
        self.send(request).await
    }

    pub async fn check_permission(
        &self,
        user_id: i64,
        permission: &str,
    ) -> Result<bool, AuthClientError> {
        let request = self
            .http
            .get(self.url("/api/v1/auth/permission"))
            .query(&[("user_id", user_id.to_string()), ("permission", permission.to_string())]);
        let decision: PermissionDecision = self.send(request).await?;
        Ok(decision.allowed)
    }

    pub async fn authenticate_service(
        &self,
        service_id: &str,
        service_secret: &str,
    ) -> Result<ServiceSession, AuthClientError> {
        let request = self
            .http
            .post(self.url("/api/v1/auth/service/login"))
            .json(&ServiceLoginBody {
                service_id,
                service_secret,
            });
        self.send(request).await
    }

    /// Service handshake that logs and yields `None` on any failure.
    pub async fn handshake_or_continue(
        &self,
        service_id: &str,
        service_secret: &str,
    ) -> Option<ServiceSession> {
        match self.authenticate_service(service_id, service_secret).await {
            Ok(session) => {
                tracing::info!(service_id = %service_id, "Service handshake succeeded");
                Some(session)
            }
            Err(e) => {
                tracing::warn!(
                    service_id = %service_id,
                    error = %e,
                    "Service handshake failed, continuing without service identity"
                );
                None
            }
        }
    }
}
