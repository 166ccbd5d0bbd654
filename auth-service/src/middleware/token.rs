//! Token lookup on inbound requests.
//!
//! User tokens: `Authorization: Bearer`, then the `token` query parameter,
//! then the session cookie. First match wins.
//! Service tokens: `X-Service-Token`, or `Authorization: Service <token>`.

use axum::{
    extract::Query,
    http::{header, HeaderMap, Uri},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use service_core::auth_client::SERVICE_TOKEN_HEADER;

const BEARER_PREFIX: &str = "Bearer ";
const SERVICE_PREFIX: &str = "Service ";

#[derive(Deserialize)]
struct TokenParam {
    token: Option<String>,
}

fn authorization_with_prefix<'a>(headers: &'a HeaderMap, prefix: &str) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(prefix))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn extract_user_token(headers: &HeaderMap, uri: &Uri, cookie_name: &str) -> Option<String> {
    if let Some(token) = authorization_with_prefix(headers, BEARER_PREFIX) {
        return Some(token.to_string());
    }

    if let Ok(Query(param)) = Query::<TokenParam>::try_from_uri(uri) {
        if let Some(token) = param.token.filter(|t| !t.is_empty()) {
            return Some(token);
        }
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

pub fn extract_service_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SERVICE_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or_else(|| authorization_with_prefix(headers, SERVICE_PREFIX))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_header_beats_query_and_cookie() {
        let h = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "access_token=from-cookie"),
        ]);
        let uri: Uri = "/x?token=from-query".parse().unwrap();
        assert_eq!(
            extract_user_token(&h, &uri, "access_token").as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn query_beats_cookie() {
        let h = headers(&[("cookie", "access_token=from-cookie")]);
        let uri: Uri = "/x?token=from-query".parse().unwrap();
        assert_eq!(
            extract_user_token(&h, &uri, "access_token").as_deref(),
            Some("from-query")
        );
    }

    #[test]
    fn cookie_is_the_last_resort() {
        let h = headers(&[("cookie", "other=1; access_token=from-cookie")]);
        let uri: Uri = "/x".parse().unwrap();
        assert_eq!(
            extract_user_token(&h, &uri, "access_token").as_deref(),
            Some("from-cookie")
        );
        assert!(extract_user_token(&HeaderMap::new(), &uri, "access_token").is_none());
    }

    #[test]
    fn service_token_never_comes_from_bearer() {
        let h = headers(&[("authorization", "Bearer user-token")]);
        assert!(extract_service_token(&h).is_none());

        let h = headers(&[("authorization", "Service svc-token")]);
        assert_eq!(extract_service_token(&h).as_deref(), Some("svc-token"));

        let h = headers(&[("x-service-token", "svc-header")]);
        assert_eq!(extract_service_token(&h).as_deref(), Some("svc-header"));
    }
}
