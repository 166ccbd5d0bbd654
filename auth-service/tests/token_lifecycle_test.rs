//! User token validation, global invalidation and token lookup order.

mod common;

use common::{envelope, error_code, TestApp, ADMIN_PASSWORD, ALICE_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn issued_token_validates_with_its_permission_snapshot() {
    let app = TestApp::spawn().await;
    let token = app.login("alice", ALICE_PASSWORD).await;

    let body = envelope(
        app.post_json("/api/v1/auth/validate", json!({ "token": token }))
            .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["user_id"], app.alice.id);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["level"], 2);
    assert_eq!(
        body["data"]["permissions"],
        json!(["read:own", "read:public", "write:own"])
    );
}

#[tokio::test]
async fn garbage_token_is_invalid() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.post_json("/api/v1/auth/validate", json!({ "token": "not.a.jwt" }))
            .await,
    )
    .await;
    assert_eq!(body["code"], 1002);
    assert_eq!(error_code(&body), "INVALID_TOKEN");
}

#[tokio::test]
async fn invalidate_all_revokes_earlier_tokens_only() {
    let app = TestApp::spawn().await;
    let alice_token = app.login("alice", ALICE_PASSWORD).await;
    let admin_token = app.login("judy", ADMIN_PASSWORD).await;

    let response = app
        .client()
        .post(app.url("/api/v1/auth/invalidate-all"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let body = envelope(response).await;
    assert_eq!(body["code"], 0);
    let epoch = body["data"]["invalidated_before"].as_i64().unwrap();
    assert!(body["data"]["invalidated_before_rfc3339"].is_string());

    let body = envelope(
        app.post_json("/api/v1/auth/validate", json!({ "token": alice_token }))
            .await,
    )
    .await;
    assert_eq!(body["code"], 1002);
    assert_eq!(error_code(&body), "TOKEN_REVOKED");

    // The admin's own token predates the epoch too
    let body = envelope(
        app.post_json("/api/v1/auth/validate", json!({ "token": admin_token }))
            .await,
    )
    .await;
    assert_eq!(error_code(&body), "TOKEN_REVOKED");

    let fresh = app.login("alice", ALICE_PASSWORD).await;
    let body = envelope(
        app.post_json("/api/v1/auth/validate", json!({ "token": fresh }))
            .await,
    )
    .await;
    assert_eq!(body["code"], 0);

    let body = envelope(app.get("/api/v1/auth/invalidation-time").await).await;
    assert_eq!(body["data"]["invalidated_before"], epoch);
}

#[tokio::test]
async fn regular_user_cannot_invalidate_everyone() {
    let app = TestApp::spawn().await;
    let token = app.login("alice", ALICE_PASSWORD).await;
    let before = app.state.auth.invalidation_time();

    let response = app
        .client()
        .post(app.url("/api/v1/auth/invalidate-all"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body = envelope(response).await;
    assert_eq!(body["code"], 1003);
    assert_eq!(error_code(&body), "PERMISSION_DENIED");
    assert_eq!(app.state.auth.invalidation_time(), before);
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.client()
            .post(app.url("/api/v1/auth/logout"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["code"], 401);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn bearer_header_wins_over_query_and_cookie() {
    let app = TestApp::spawn().await;
    let admin_token = app.login("judy", ADMIN_PASSWORD).await;
    let alice_token = app.login("alice", ALICE_PASSWORD).await;

    // Header carries alice, cookie carries the admin: alice is denied
    let response = app
        .client()
        .post(app.url("/api/v1/auth/invalidate-all"))
        .bearer_auth(&alice_token)
        .header("Cookie", format!("access_token={}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(response).await["code"], 1003);

    // Query carries alice, cookie carries the admin: the query wins
    let response = app
        .client()
        .post(app.url(&format!("/api/v1/auth/invalidate-all?token={}", alice_token)))
        .header("Cookie", format!("access_token={}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(response).await["code"], 1003);

    // Cookie alone is enough
    let response = app
        .client()
        .post(app.url("/api/v1/auth/invalidate-all"))
        .header("Cookie", format!("access_token={}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(envelope(response).await["code"], 0);
}

#[tokio::test]
async fn service_token_is_not_a_user_token() {
    let app = TestApp::spawn().await;
    let service_token = app.service_login("job-service", "job-secret").await;

    let body = envelope(
        app.post_json("/api/v1/auth/validate", json!({ "token": service_token }))
            .await,
    )
    .await;
    assert_eq!(body["code"], 1002);
    assert_eq!(error_code(&body), "INVALID_TOKEN");
}
