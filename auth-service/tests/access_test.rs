//! Permission lookups, access decisions, audit reporting and health.

mod common;

use common::{envelope, error_code, TestApp};
use serde_json::json;

#[tokio::test]
async fn permission_check_follows_the_live_role() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.get(&format!(
            "/api/v1/auth/permission?user_id={}&permission=write:own",
            app.alice.id
        ))
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["user_id"], app.alice.id);
    assert_eq!(body["data"]["permission"], "write:own");
    assert_eq!(body["data"]["allowed"], true);

    let body = envelope(
        app.get(&format!(
            "/api/v1/auth/permission?user_id={}&permission=delete:all",
            app.alice.id
        ))
        .await,
    )
    .await;
    assert_eq!(body["data"]["allowed"], false);

    let body = envelope(app.get("/api/v1/auth/permission?user_id=9999&permission=read:own").await).await;
    assert_eq!(body["code"], 1001);
    assert_eq!(error_code(&body), "USER_NOT_FOUND");
}

#[tokio::test]
async fn missing_query_parameters_are_invalid() {
    let app = TestApp::spawn().await;

    let body = envelope(app.get("/api/v1/auth/permission?permission=read:own").await).await;
    assert_eq!(body["code"], 400);
    assert_eq!(error_code(&body), "INVALID_PARAMS");
}

#[tokio::test]
async fn access_decision_is_action_then_resource_and_audited() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.post_json(
            "/api/v1/auth/access",
            json!({ "user_id": app.alice.id, "resource": "own", "action": "read" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["permission"], "read:own");
    assert_eq!(body["data"]["allowed"], true);

    let body = envelope(
        app.post_json(
            "/api/v1/auth/access",
            json!({ "user_id": app.alice.id, "resource": "all", "action": "delete" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"]["allowed"], false);

    // Access audits are written in the background
    let mut logs = Vec::new();
    for _ in 0..50 {
        logs = app.store.access_logs();
        if logs.len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let denied = logs
        .iter()
        .find(|entry| entry.action == "access:delete:all")
        .expect("denied access not audited");
    assert!(!denied.success);
    assert!(logs.iter().any(|entry| entry.action == "access:read:own" && entry.success));
}

#[tokio::test]
async fn reported_access_is_recorded_with_caller_details() {
    let app = TestApp::spawn().await;

    let body = envelope(
        app.post_json(
            "/api/v1/auth/log",
            json!({
                "user_id": app.alice.id,
                "action": "download",
                "resource": "invoice",
                "result": "denied_by_quota",
                "ip": "203.0.113.9",
                "user_agent": "billing-worker/1.0"
            }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["success"], true);

    let body = envelope(
        app.post_json(
            "/api/v1/auth/log",
            json!({
                "user_id": app.alice.id,
                "action": "view",
                "resource": "invoice",
                "result": "SUCCESS"
            }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);

    let logs = app.store.access_logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action, "download:invoice");
    assert_eq!(logs[0].username, "alice");
    assert!(!logs[0].success);
    assert_eq!(logs[0].failure_reason.as_deref(), Some("denied_by_quota"));
    assert_eq!(logs[0].ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(logs[0].user_agent.as_deref(), Some("billing-worker/1.0"));
    assert!(logs[1].success);
    assert!(logs[1].failure_reason.is_none());
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_request() {
    let app = TestApp::spawn().await;
    app.store.fail_audit_writes(true);

    let body = envelope(
        app.post_json(
            "/api/v1/auth/log",
            json!({ "user_id": app.alice.id, "action": "view", "result": "success" }),
        )
        .await,
    )
    .await;
    assert_eq!(body["code"], 0);
    assert!(app.store.access_logs().is_empty());
}

#[tokio::test]
async fn roles_are_listed_by_level() {
    let app = TestApp::spawn().await;

    let body = envelope(app.get("/api/v1/auth/roles").await).await;
    let names: Vec<&str> = body["data"]["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|role| role["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["guest", "user", "admin", "super_admin"]);

    let body = envelope(app.get("/api/v1/auth/permissions?role=admin").await).await;
    assert_eq!(body["data"]["role"], "admin");
    assert_eq!(body["data"]["permissions"].as_array().unwrap().len(), 6);

    let body = envelope(app.get("/api/v1/auth/permissions?role=nobody").await).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["permissions"], json!([]));
}

#[tokio::test]
async fn unknown_user_lookup_is_user_not_found() {
    let app = TestApp::spawn().await;

    let body = envelope(app.get("/api/v1/auth/user?user_id=424242").await).await;
    assert_eq!(body["code"], 1001);

    let body = envelope(
        app.get(&format!("/api/v1/auth/user?user_id={}", app.root.id))
            .await,
    )
    .await;
    assert_eq!(body["data"]["role"], "super_admin");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn health_degrades_but_still_answers() {
    let app = TestApp::spawn().await;

    let body = envelope(app.get("/health").await).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["service"], "auth-service");
    assert_eq!(body["data"]["credential_store"], "up");

    app.store.set_unavailable(true);
    let body = envelope(app.get("/health").await).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["credential_store"], "down");
}

#[tokio::test]
async fn store_outage_is_an_internal_error_without_details() {
    let app = TestApp::spawn().await;
    app.store.set_unavailable(true);

    let body = envelope(
        app.get(&format!("/api/v1/auth/user?user_id={}", app.alice.id))
            .await,
    )
    .await;
    assert_eq!(body["code"], 500);
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn unknown_route_answers_in_the_envelope() {
    let app = TestApp::spawn().await;
    let body = envelope(app.get("/api/v1/auth/nope").await).await;
    assert_eq!(body["code"], 404);
    assert_eq!(error_code(&body), "NOT_FOUND");
}
