use axum::extract::State;
use service_core::response::{ApiResponse, ApiResult};

use crate::{
    dtos::admin::{AdminChangeResponse, RolePermissionRequest, UserRoleRequest},
    middleware::{AuthUser, ClientMeta},
    utils::ValidatedJson,
    AppState,
};

pub async fn assign_user_role(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    AuthUser(actor): AuthUser,
    ValidatedJson(req): ValidatedJson<UserRoleRequest>,
) -> ApiResult<AdminChangeResponse> {
    state
        .auth
        .assign_role(&actor, req.user_id, &req.role, &client)
        .await?;
    Ok(ApiResponse::with_message(
        "Role assigned",
        AdminChangeResponse { changed: true },
    ))
}

pub async fn revoke_user_role(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    AuthUser(actor): AuthUser,
    ValidatedJson(req): ValidatedJson<UserRoleRequest>,
) -> ApiResult<AdminChangeResponse> {
    let changed = state
        .auth
        .revoke_role(&actor, req.user_id, &req.role, &client)
        .await?;
    Ok(ApiResponse::with_message(
        "Role revoked",
        AdminChangeResponse { changed },
    ))
}

pub async fn grant_role_permission(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    AuthUser(actor): AuthUser,
    ValidatedJson(req): ValidatedJson<RolePermissionRequest>,
) -> ApiResult<AdminChangeResponse> {
    state
        .auth
        .grant_permission(&actor, &req.role, &req.permission, &client)
        .await?;
    Ok(ApiResponse::with_message(
        "Permission granted",
        AdminChangeResponse { changed: true },
    ))
}

pub async fn revoke_role_permission(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    AuthUser(actor): AuthUser,
    ValidatedJson(req): ValidatedJson<RolePermissionRequest>,
) -> ApiResult<AdminChangeResponse> {
    let changed = state
        .auth
        .revoke_permission(&actor, &req.role, &req.permission, &client)
        .await?;
    Ok(ApiResponse::with_message(
        "Permission revoked",
        AdminChangeResponse { changed },
    ))
}
