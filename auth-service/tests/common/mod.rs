//! Test helpers for auth-service HTTP tests.
//!
//! Each test gets its own server on a random port backed by an in-memory
//! credential store seeded with the built-in catalog.

#![allow(dead_code)]

use auth_service::{
    build_router,
    config::AuthConfig,
    models::User,
    services::{bootstrap, MockCredentialStore},
    AppState,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const ALICE_PASSWORD: &str = "alice-password";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const ROOT_PASSWORD: &str = "root-password";

/// API paths the job service may call.
pub const JOB_SERVICE_APIS: &[&str] = &["/internal/v1/jobs/*"];
/// Route template for the internal user lookup.
pub const USER_LOOKUP_API: &str = "/internal/v1/auth/users/:id";

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub store: Arc<MockCredentialStore>,
    pub alice: User,
    pub admin: User,
    pub root: User,
    client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(AuthConfig::for_tests()).await
    }

    pub async fn spawn_with(config: AuthConfig) -> Self {
        let store = Arc::new(MockCredentialStore::new());
        bootstrap::seed_catalog(store.as_ref(), &config.service_name)
            .await
            .expect("Failed to seed catalog");

        let alice = store
            .add_user("alice", ALICE_PASSWORD, Some("user"))
            .expect("Failed to add alice");
        let admin = store
            .add_user("judy", ADMIN_PASSWORD, Some("admin"))
            .expect("Failed to add admin");
        let root = store
            .add_user("root", ROOT_PASSWORD, Some("super_admin"))
            .expect("Failed to add root");

        store
            .add_service("job-service", "job-secret", JOB_SERVICE_APIS)
            .expect("Failed to add job-service");
        store
            .add_service("user-service", "user-secret", &[USER_LOOKUP_API])
            .expect("Failed to add user-service");

        let state = AppState::new(config, store.clone());
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            state,
            store,
            alice,
            admin,
            root,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Logs in and returns the user token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let body = envelope(
            self.post_json(
                "/api/v1/auth/login",
                serde_json::json!({ "username": username, "password": password }),
            )
            .await,
        )
        .await;
        assert_eq!(body["code"], 0, "login failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Runs the service handshake and returns the service token.
    pub async fn service_login(&self, service_id: &str, secret: &str) -> String {
        let body = envelope(
            self.post_json(
                "/api/v1/auth/service/login",
                serde_json::json!({ "service_id": service_id, "service_secret": secret }),
            )
            .await,
        )
        .await;
        assert_eq!(body["code"], 0, "service login failed: {}", body);
        body["data"]["service_token"].as_str().unwrap().to_string()
    }
}

/// Asserts the transport status is 200 and returns the parsed envelope.
pub async fn envelope(response: reqwest::Response) -> Value {
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["timestamp"].as_i64().is_some(), "missing timestamp: {}", body);
    assert!(body.get("message").is_some(), "missing message: {}", body);
    body
}

pub fn error_code(body: &Value) -> &str {
    body["data"]["error_code"].as_str().unwrap_or_default()
}
