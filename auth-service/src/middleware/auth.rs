use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use service_core::response::ApiError;

use super::token::extract_user_token;
use crate::{services::ValidatedIdentity, AppState};

/// Requires a valid user token and stores the identity in the request
/// extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_user_token(
        req.headers(),
        req.uri(),
        &state.config.session.cookie_name,
    )
    .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let identity = state.auth.validate(&token).await.map_err(|e| {
        tracing::debug!(error_code = e.error_code(), "User token rejected");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Identity placed by [`auth_middleware`].
pub struct AuthUser(pub ValidatedIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<ValidatedIdentity>().ok_or_else(|| {
            tracing::error!("User identity missing from request extensions");
            ApiError::internal()
        })?;

        Ok(AuthUser(identity.clone()))
    }
}
