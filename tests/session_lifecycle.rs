mod common;

use chrono::Duration;
use serde_json::{Value, json};

use common::TestApp;

#[tokio::test]
async fn api_token_is_exchanged_for_a_four_hour_session() {
    let app = TestApp::spawn().await;
    let api_token = app.subscriber("sub-1", "standard").await;

    let response = app
        .server
        .post("/api/v1/sessions")
        .json(&json!({
            "api_token": api_token,
            "device_id": "living-room",
            "platform": "tvos",
            "client_version": "3.2.1"
        }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(!body["data"]["token"].as_str().unwrap().is_empty());

    let expires_at: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["data"]["expires_at"].clone()).unwrap();
    assert_eq!(expires_at, app.now() + Duration::hours(4));
}

#[tokio::test]
async fn api_token_may_be_sent_as_bearer() {
    let app = TestApp::spawn().await;
    let api_token = app.subscriber("sub-1", "basic").await;

    let response = app
        .server
        .post("/api/v1/sessions")
        .authorization_bearer(&api_token)
        .json(&json!({ "device_id": "phone" }))
        .await;

    assert_eq!(response.status_code(), 201);
}

#[tokio::test]
async fn unknown_api_token_is_rejected() {
    let app = TestApp::spawn().await;
    app.subscriber("sub-1", "standard").await;

    let response = app
        .server
        .post("/api/v1/sessions")
        .json(&json!({ "api_token": "gw_not-a-real-token", "device_id": "tv" }))
        .await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "auth_invalid");
}

#[tokio::test]
async fn revoked_api_token_cannot_open_sessions() {
    let app = TestApp::spawn().await;
    let api_token = app.subscriber("sub-1", "standard").await;
    assert!(app.state.credentials.revoke_token(&api_token).await.unwrap());

    let response = app
        .server
        .post("/api/v1/sessions")
        .json(&json!({ "api_token": api_token, "device_id": "tv" }))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn missing_device_id_is_a_validation_error() {
    let app = TestApp::spawn().await;
    let api_token = app.subscriber("sub-1", "standard").await;

    let response = app
        .server
        .post("/api/v1/sessions")
        .json(&json!({ "api_token": api_token, "device_id": "   " }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_failed");
}

#[tokio::test]
async fn session_is_valid_until_expiry() {
    let app = TestApp::spawn().await;
    let session = app.session("sub-1", "standard").await;

    app.clock.advance(Duration::minutes(239));
    let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["data"]["subscriber_id"], "sub-1");
    assert_eq!(body["data"]["device_id"], "test-device");
    assert_eq!(body["data"]["entitlement"]["plan_slug"], "standard");
    assert_eq!(body["data"]["entitlement"]["max_concurrent_streams"], 2);

    app.clock.advance(Duration::minutes(2));
    let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "auth_invalid");
}

#[tokio::test]
async fn missing_and_garbage_tokens_look_the_same() {
    let app = TestApp::spawn().await;

    let missing = app.server.get("/api/v1/me").await;
    let garbage = app.server.get("/api/v1/me").authorization_bearer("nope").await;

    assert_eq!(missing.status_code(), 401);
    assert_eq!(garbage.status_code(), 401);
    let missing: Value = missing.json();
    let garbage: Value = garbage.json();
    assert_eq!(missing["code"], garbage["code"]);
    assert_eq!(missing["error"], garbage["error"]);
}

#[tokio::test]
async fn revoked_session_stops_working() {
    let app = TestApp::spawn().await;
    let session = app.session("sub-1", "standard").await;

    let response = app
        .server
        .delete("/api/v1/sessions/current")
        .authorization_bearer(&session)
        .await;
    assert_eq!(response.status_code(), 204);

    let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn lapsed_subscription_cannot_log_in() {
    let app = TestApp::spawn().await;
    let api_token = app.subscriber("sub-1", "premium").await;

    app.clock.advance(Duration::days(31));
    let response = app
        .server
        .post("/api/v1/sessions")
        .json(&json!({ "api_token": api_token, "device_id": "tv" }))
        .await;
    assert_eq!(response.status_code(), 401);
}
