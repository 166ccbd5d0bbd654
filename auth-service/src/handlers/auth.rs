use axum::extract::State;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::response::{ApiError, ApiResponse, ApiResult};

use crate::{
    dtos::auth::{
        AccessRequest, AccessResponse, Ack, InvalidationResponse, LogRequest, LoginRequest,
        LoginResponse, PermissionQuery, PermissionResponse, RegisterRequest, RolePermissionsQuery,
        RolePermissionsResponse, RolesResponse, UserQuery, ValidateRequest, ValidateResponse,
    },
    middleware::{AuthUser, ClientMeta},
    models::{ClientInfo, UserSummary},
    utils::{Password, ValidatedJson, ValidatedQuery},
    AppState,
};

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((state.config.session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.secure_cookie)
        .max_age(time::Duration::seconds(
            state.config.session.cookie_max_age_seconds,
        ))
        .build()
}

pub async fn login(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let auth = state
        .auth
        .authenticate(&req.username, Password::new(req.password), &client)
        .await?;

    let jar = jar.add(session_cookie(&state, auth.token.clone()));
    Ok((jar, ApiResponse::with_message("Login successful", auth.into())))
}

pub async fn register(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<UserSummary> {
    let user = state
        .auth
        .register(&req.username, &req.email, Password::new(req.password), &client)
        .await?;
    Ok(ApiResponse::with_message("Registration successful", user))
}

pub async fn validate(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ValidateRequest>,
) -> ApiResult<ValidateResponse> {
    let identity = state.auth.validate(&req.token).await?;
    Ok(ApiResponse::success(identity.into()))
}

pub async fn check_permission(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<PermissionQuery>,
) -> ApiResult<PermissionResponse> {
    let allowed = state
        .auth
        .check_permission(query.user_id, &query.permission)
        .await?;
    Ok(ApiResponse::success(PermissionResponse {
        user_id: query.user_id,
        permission: query.permission,
        allowed,
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<UserQuery>,
) -> ApiResult<UserSummary> {
    Ok(ApiResponse::success(state.auth.get_user(query.user_id).await?))
}

pub async fn validate_access(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<AccessRequest>,
) -> ApiResult<AccessResponse> {
    let allowed = state
        .auth
        .validate_access(req.user_id, &req.resource, &req.action, &client)
        .await?;
    Ok(ApiResponse::success(AccessResponse {
        user_id: req.user_id,
        permission: crate::models::permission_code(&req.resource, &req.action),
        allowed,
    }))
}

/// Explicit addresses in the body win over the caller's own.
pub async fn log_access(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(req): ValidatedJson<LogRequest>,
) -> ApiResult<Ack> {
    let client = ClientInfo {
        ip_address: req.ip_address.or(client.ip_address),
        user_agent: req.user_agent.or(client.user_agent),
    };
    state
        .auth
        .log_access(req.user_id, &req.action, &req.resource, &req.result, &client)
        .await;
    Ok(ApiResponse::success(Ack::ok()))
}

pub async fn roles(State(state): State<AppState>) -> ApiResult<RolesResponse> {
    let roles = state.auth.roles().await?;
    Ok(ApiResponse::success(RolesResponse { roles }))
}

pub async fn role_permissions(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<RolePermissionsQuery>,
) -> ApiResult<RolePermissionsResponse> {
    let permissions = state.auth.permissions_for_role(&query.role).await?;
    Ok(ApiResponse::success(RolePermissionsResponse {
        role: query.role,
        permissions,
    }))
}

fn invalidation(state: &AppState) -> InvalidationResponse {
    InvalidationResponse {
        invalidated_before: state.auth.invalidation_time(),
        invalidated_before_rfc3339: state.auth.epoch().current_rfc3339(),
    }
}

pub async fn invalidate_all(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    AuthUser(actor): AuthUser,
) -> ApiResult<InvalidationResponse> {
    state.auth.invalidate_all(&actor, &client).await?;
    Ok(ApiResponse::with_message(
        "All user tokens invalidated",
        invalidation(&state),
    ))
}

pub async fn invalidation_time(State(state): State<AppState>) -> ApiResult<InvalidationResponse> {
    Ok(ApiResponse::success(invalidation(&state)))
}

pub async fn logout(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    AuthUser(identity): AuthUser,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<Ack>) {
    state.auth.logout(&identity, &client).await;
    let jar = jar.remove(
        Cookie::build((state.config.session.cookie_name.clone(), "")).path("/"),
    );
    (jar, ApiResponse::with_message("Logged out", Ack::ok()))
}
