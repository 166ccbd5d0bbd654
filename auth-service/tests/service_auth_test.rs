//! Service handshake, service token validation and internal route guarding.

mod common;

use common::{envelope, error_code, TestApp, ALICE_PASSWORD, JOB_SERVICE_APIS};
use serde_json::{json, Value};

async fn check_service(app: &TestApp, service_id: &str, api_path: &str) -> Value {
    envelope(
        app.post_json(
            "/api/v1/auth/service/permission",
            json!({ "service_id": service_id, "api_path": api_path }),
        )
        .await,
    )
    .await
}

#[tokio::test]
async fn handshake_returns_token_scoped_to_allow_list() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/login",
            json!({ "service_id": "job-service", "service_secret": "job-secret" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["service_id"], "job-service");
    assert_eq!(body["data"]["allowed_apis"], json!(JOB_SERVICE_APIS));
    assert!(body["data"]["expires_in"].as_i64().unwrap() > 0);

    let token = body["data"]["service_token"].as_str().unwrap();
    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/validate",
            json!({ "service_token": token }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["service_id"], "job-service");
    assert_eq!(body["data"]["service_type"], "internal");
}

#[tokio::test]
async fn handshake_failures_are_distinguished() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/login",
            json!({ "service_id": "job-service", "service_secret": "wrong" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 401);
    assert_eq!(error_code(&body), "INVALID_SECRET");

    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/login",
            json!({ "service_id": "ghost-service", "service_secret": "x" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 404);
    assert_eq!(error_code(&body), "SERVICE_NOT_FOUND");

    app.store.set_service_active("job-service", false).unwrap();
    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/login",
            json!({ "service_id": "job-service", "service_secret": "job-secret" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 403);
    assert_eq!(error_code(&body), "SERVICE_DISABLED");
}

#[tokio::test]
async fn user_token_is_not_a_service_token() {
    let app = TestApp::spawn().await;
    let user_token = app.login("alice", ALICE_PASSWORD).await;

    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/validate",
            json!({ "service_token": user_token }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 1002);
    assert_eq!(error_code(&body), "INVALID_TOKEN");
}

#[tokio::test]
async fn allow_list_is_matched_exactly() {
    let app = TestApp::spawn().await;

    let body = check_service(&app, "job-service", "/internal/v1/users/delete").await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["allowed"], false);

    let body = check_service(&app, "job-service", "/internal/v1/jobs/*").await;
    assert_eq!(body["data"]["allowed"], true);

    let body = check_service(&app, "ghost-service", "/internal/v1/jobs/*").await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["allowed"], false);
}

#[tokio::test]
async fn internal_route_admits_listed_service() {
    let app = TestApp::spawn().await;
    let token = app.service_login("user-service", "user-secret").await;

    let response = app
        .client()
        .get(app.url(&format!("/internal/v1/auth/users/{}", app.alice.id)))
        .header("X-Service-Token", &token)
        .send()
        .await
        .unwrap();
    let body = envelope(response).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "user");

    let response = app
        .client()
        .get(app.url(&format!("/internal/v1/auth/users/{}", app.alice.id)))
        .header("Authorization", format!("Service {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(response).await["code"], 0);
}

#[tokio::test]
async fn internal_route_refuses_unlisted_service_and_user_tokens() {
    let app = TestApp::spawn().await;
    let job_token = app.service_login("job-service", "job-secret").await;
    let user_token = app.login("alice", ALICE_PASSWORD).await;

    let response = app
        .client()
        .get(app.url(&format!("/internal/v1/auth/users/{}", app.alice.id)))
        .header("X-Service-Token", &job_token)
        .send()
        .await
        .unwrap();
    let body = envelope(response).await;
    assert_eq!(body["code"], 1003);
    assert_eq!(error_code(&body), "PERMISSION_DENIED");

    let response = app
        .client()
        .get(app.url(&format!("/internal/v1/auth/users/{}", app.alice.id)))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(response).await["code"], 401);

    // A user token smuggled into the service header fails signature checks
    let response = app
        .client()
        .get(app.url(&format!("/internal/v1/auth/users/{}", app.alice.id)))
        .header("X-Service-Token", &user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(response).await["code"], 1002);
}

#[tokio::test]
async fn disabled_service_loses_access_immediately() {
    let app = TestApp::spawn().await;
    let token = app.service_login("user-service", "user-secret").await;
    app.store.set_service_active("user-service", false).unwrap();

    let response = app
        .client()
        .get(app.url(&format!("/internal/v1/auth/users/{}", app.alice.id)))
        .header("X-Service-Token", &token)
        .send()
        .await
        .unwrap();
    let body = envelope(response).await;
    assert_eq!(error_code(&body), "SERVICE_DISABLED");
}

#[tokio::test]
async fn service_tokens_survive_user_invalidation() {
    let app = TestApp::spawn().await;
    let token = app.service_login("user-service", "user-secret").await;

    app.state.auth.epoch().invalidate_all();

    let body = envelope(
        app.post_json(
            "/api/v1/auth/service/validate",
            json!({ "service_token": token }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
}
