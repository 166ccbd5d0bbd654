use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use service_core::middleware::rate_limit::client_ip;
use std::{convert::Infallible, net::SocketAddr};

use crate::{models::ClientInfo, AppState};

/// Caller address and user agent for audit records.
pub struct ClientMeta(pub ClientInfo);

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientMeta(ClientInfo {
            ip_address: client_ip(
                &parts.headers,
                peer.as_ref(),
                state.config.security.trust_forwarded_for,
            )
            .map(|ip| ip.to_string()),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }))
    }
}
