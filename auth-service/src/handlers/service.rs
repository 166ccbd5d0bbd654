use axum::extract::State;
use service_core::response::{now_millis, ApiResponse, ApiResult};

use crate::{
    dtos::service::{
        ServiceLoginRequest, ServiceLoginResponse, ServicePermissionRequest,
        ServicePermissionResponse, ServiceValidateRequest, ServiceValidateResponse,
    },
    utils::{Password, ValidatedJson},
    AppState,
};

pub async fn service_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ServiceLoginRequest>,
) -> ApiResult<ServiceLoginResponse> {
    let session = state
        .services
        .authenticate_service(&req.service_id, Password::new(req.service_secret))
        .await?;
    Ok(ApiResponse::with_message(
        "Service authenticated",
        ServiceLoginResponse::new(session, now_millis() / 1000),
    ))
}

pub async fn service_validate(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ServiceValidateRequest>,
) -> ApiResult<ServiceValidateResponse> {
    let service = state
        .services
        .validate_service_token(&req.service_token)
        .await?;
    Ok(ApiResponse::success(ServiceValidateResponse {
        valid: true,
        service,
    }))
}

pub async fn service_permission(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ServicePermissionRequest>,
) -> ApiResult<ServicePermissionResponse> {
    let allowed = state
        .services
        .check_service_permission(&req.service_id, &req.api_path)
        .await?;
    Ok(ApiResponse::success(ServicePermissionResponse {
        service_id: req.service_id,
        api_path: req.api_path,
        allowed,
    }))
}
