//! Uniform response envelope.
//!
//! Every endpoint answers HTTP 200 with `{code, message, data, timestamp}`.
//! A zero `code` means success; anything else is a business or
//! infrastructure failure drawn from [`codes`]. Clients branch on `code`
//! and never on the transport status.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Application-level result codes carried in the envelope.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_PARAMS: i32 = 400;
    pub const UNAUTHORIZED: i32 = 401;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const TOO_MANY_REQUESTS: i32 = 429;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const USER_NOT_FOUND: i32 = 1001;
    pub const INVALID_TOKEN: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const RESOURCE_NOT_FOUND: i32 = 1004;
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_message("success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: codes::SUCCESS,
            message: message.into(),
            data: Some(data),
            timestamp: now_millis(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == codes::SUCCESS
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Payload placed in `data` for every failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub success: bool,
    pub error_code: String,
}

/// A classified failure rendered through the envelope.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: i32,
    pub error_code: String,
    pub message: String,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(code: i32, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            error_code: error_code.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, "INVALID_PARAMS", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(codes::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Generic internal failure. The cause is logged by the caller, never echoed.
    pub fn internal() -> Self {
        Self::new(codes::INTERNAL_ERROR, "INTERNAL_ERROR", "Internal server error")
    }

    pub fn retry_after(mut self, seconds: Option<u64>) -> Self {
        self.retry_after = seconds;
        self
    }

    pub fn into_envelope(self) -> ApiResponse<ErrorData> {
        ApiResponse {
            code: self.code,
            message: self.message,
            data: Some(ErrorData {
                success: false,
                error_code: self.error_code,
            }),
            timestamp: now_millis(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.error_code, self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.retry_after;
        let mut res = self.into_envelope().into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                res.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        res
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_envelope_has_zero_code_and_payload() {
        let res = ApiResponse::success(serde_json::json!({ "valid": true })).into_response();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(res).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["message"], "success");
        assert_eq!(body["data"]["valid"], true);
        assert!(body["timestamp"].as_i64().unwrap() > 1_600_000_000_000);
    }

    #[tokio::test]
    async fn errors_still_answer_http_200() {
        let res = ApiError::new(codes::INVALID_TOKEN, "TOKEN_REVOKED", "Token has been revoked")
            .into_response();
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(res).await;
        assert_eq!(body["code"], 1002);
        assert_eq!(body["data"]["success"], false);
        assert_eq!(body["data"]["error_code"], "TOKEN_REVOKED");
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let res = ApiError::new(codes::TOO_MANY_REQUESTS, "RATE_LIMITED", "slow down")
            .retry_after(Some(12))
            .into_response();
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let err = crate::error::AppError::DatabaseError(anyhow::anyhow!(
            "password authentication failed for user postgres"
        ));
        let body = body_json(err.into_response()).await;
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], "Internal server error");
    }
}
