pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::auth_client::SERVICE_TOKEN_HEADER;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimit},
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthConfig;
use crate::services::{
    AuthService, CredentialStore, InvalidationEpoch, ServiceAuthService, ServiceTokenService,
    UserTokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub store: Arc<dyn CredentialStore>,
    pub auth: AuthService,
    pub services: ServiceAuthService,
    pub login_rate_limit: IpRateLimit,
}

impl AppState {
    /// Wires both trust domains over one credential store. The invalidation
    /// epoch starts now.
    pub fn new(config: AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        let auth = AuthService::new(
            store.clone(),
            UserTokenService::from_config(&config.jwt),
            InvalidationEpoch::new(),
        );
        let services =
            ServiceAuthService::new(store.clone(), ServiceTokenService::from_config(&config.jwt));
        let login_rate_limit = IpRateLimit {
            limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            trust_forwarded_for: config.security.trust_forwarded_for,
        };

        Self {
            config,
            store,
            auth,
            services,
            login_rate_limit,
        }
    }
}

fn cors_layer(config: &AuthConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter(|o| {
            if o.as_str() == "*" {
                tracing::warn!("Wildcard CORS origin cannot be combined with credentials, ignoring");
            }
            o.as_str() != "*"
        })
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SERVICE_TOKEN_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limit.clone(),
            ip_rate_limit_middleware,
        ));

    // User bearer token required
    let user_routes = Router::new()
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/v1/auth/invalidate-all",
            post(handlers::auth::invalidate_all),
        )
        .route(
            "/api/v1/auth/admin/user-roles",
            post(handlers::admin::assign_user_role).delete(handlers::admin::revoke_user_role),
        )
        .route(
            "/api/v1/auth/admin/role-permissions",
            post(handlers::admin::grant_role_permission)
                .delete(handlers::admin::revoke_role_permission),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Service token required
    let internal_routes = Router::new()
        .route(
            "/internal/v1/auth/users/:id",
            get(handlers::internal::get_user),
        )
        .route(
            "/internal/v1/auth/users/:id/permissions",
            get(handlers::internal::get_user_permissions),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::service_auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/validate", post(handlers::auth::validate))
        .route(
            "/api/v1/auth/permission",
            get(handlers::auth::check_permission),
        )
        .route("/api/v1/auth/user", get(handlers::auth::get_user))
        .route("/api/v1/auth/access", post(handlers::auth::validate_access))
        .route("/api/v1/auth/log", post(handlers::auth::log_access))
        .route("/api/v1/auth/roles", get(handlers::auth::roles))
        .route(
            "/api/v1/auth/permissions",
            get(handlers::auth::role_permissions),
        )
        .route(
            "/api/v1/auth/invalidation-time",
            get(handlers::auth::invalidation_time),
        )
        .route(
            "/api/v1/auth/service/login",
            post(handlers::service::service_login),
        )
        .route(
            "/api/v1/auth/service/validate",
            post(handlers::service::service_validate),
        )
        .route(
            "/api/v1/auth/service/permission",
            post(handlers::service::service_permission),
        )
        .merge(login_route)
        .merge(user_routes)
        .merge(internal_routes)
        .fallback(handlers::not_found)
        .with_state(state.clone())
        .route_layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer(&state.config))
}
