use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use service_core::response::ApiError;

use super::token::extract_service_token;
use crate::{
    services::{AuthError, ServiceIdentity},
    AppState,
};

/// Requires a service token whose allow-list admits the route, either by its
/// concrete path or by its route template. User bearer tokens are refused.
pub async fn service_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_service_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("Service token required"))?;

    let service = state
        .services
        .validate_service_token(&token)
        .await
        .map_err(ApiError::from)?;

    let path = req.uri().path().to_string();
    let template = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());

    let permitted = service.may_call(&path)
        || template.as_deref().is_some_and(|t| service.may_call(t));
    if !permitted {
        tracing::warn!(
            service_id = %service.service_id,
            path = %path,
            "Service call outside allow-list"
        );
        return Err(AuthError::PermissionDenied(format!(
            "{} may not call {}",
            service.service_id, path
        ))
        .into());
    }

    req.extensions_mut().insert(service);
    Ok(next.run(req).await)
}

/// Calling service placed by [`service_auth_middleware`].
pub struct ServiceCaller(pub ServiceIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ServiceCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let service = parts.extensions.get::<ServiceIdentity>().ok_or_else(|| {
            tracing::error!("Service identity missing from request extensions");
            ApiError::internal()
        })?;

        Ok(ServiceCaller(service.clone()))
    }
}
