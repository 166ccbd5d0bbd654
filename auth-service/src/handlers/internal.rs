//! Routes for other services, reachable only with a service token.

use axum::extract::{Path, State};
use service_core::response::{ApiResponse, ApiResult};

use crate::{
    dtos::auth::RolePermissionsResponse, middleware::ServiceCaller, models::UserSummary, AppState,
};

pub async fn get_user(
    State(state): State<AppState>,
    ServiceCaller(caller): ServiceCaller,
    Path(user_id): Path<i64>,
) -> ApiResult<UserSummary> {
    tracing::debug!(service_id = %caller.service_id, user_id = %user_id, "Internal user lookup");
    Ok(ApiResponse::success(state.auth.get_user(user_id).await?))
}

pub async fn get_user_permissions(
    State(state): State<AppState>,
    ServiceCaller(caller): ServiceCaller,
    Path(user_id): Path<i64>,
) -> ApiResult<RolePermissionsResponse> {
    tracing::debug!(service_id = %caller.service_id, user_id = %user_id, "Internal permission lookup");
    let user = state.auth.get_user(user_id).await?;
    let permissions = state.auth.permissions_for_role(&user.role).await?;
    Ok(ApiResponse::success(RolePermissionsResponse {
        role: user.role,
        permissions,
    }))
}
