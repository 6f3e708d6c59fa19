mod common;

use chrono::Duration;
use serde_json::Value;

use common::{TestApp, test_config};
use iptv_gateway::config::LimiterBackend;

#[tokio::test]
async fn hundred_calls_per_window_then_429() {
    let app = TestApp::spawn().await;
    let session = app.session("sub-1", "standard").await;

    let mut accepted = 0;
    let mut rejected = Vec::new();
    for _ in 0..150 {
        let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
        match response.status_code().as_u16() {
            200 => accepted += 1,
            429 => rejected.push(response),
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(accepted, 100);
    assert_eq!(rejected.len(), 50);

    let last = rejected.last().unwrap();
    let retry_after: u64 = last
        .headers()
        .get("retry-after")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(last.headers().get("x-ratelimit-limit").unwrap(), "100");
    assert_eq!(last.headers().get("x-ratelimit-remaining").unwrap(), "0");

    let body: Value = last.json();
    assert_eq!(body["code"], "rate_limit_exceeded");
    assert_eq!(body["details"]["limit"], 100);
}

#[tokio::test]
async fn next_window_starts_fresh() {
    let app = TestApp::spawn().await;
    let session = app.session("sub-1", "standard").await;

    for _ in 0..100 {
        app.server.get("/api/v1/me").authorization_bearer(&session).await;
    }
    let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
    assert_eq!(response.status_code(), 429);

    app.clock.advance(Duration::seconds(60));
    let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "99");
}

#[tokio::test]
async fn budgets_are_per_session() {
    let app = TestApp::spawn().await;
    let api_token = app.subscriber("sub-1", "standard").await;
    let first = app.login(&api_token).await;
    let second = app.login(&api_token).await;

    for _ in 0..100 {
        app.server.get("/api/v1/me").authorization_bearer(&first).await;
    }
    assert_eq!(
        app.server.get("/api/v1/me").authorization_bearer(&first).await.status_code(),
        429
    );
    assert_eq!(
        app.server.get("/api/v1/me").authorization_bearer(&second).await.status_code(),
        200
    );
}

#[tokio::test]
async fn stream_slots_are_enforced_per_plan() {
    let app = TestApp::spawn().await;
    app.channel("news", "News", Some("News"), Some(1)).await;
    let session = app.session("sub-1", "standard").await;

    // Two issuances already in flight for this subscriber
    let entitlement = app.state.entitlements.for_subscriber("sub-1").await.unwrap();
    let slots = app.state.admission.slots();
    let first = slots.check_and_reserve("sub-1", &entitlement).await.unwrap();
    let second = slots.check_and_reserve("sub-1", &entitlement).await.unwrap();

    let response = app
        .server
        .get("/api/v1/channels/news/stream")
        .authorization_bearer(&session)
        .await;
    assert_eq!(response.status_code(), 429);
    let body: Value = response.json();
    assert_eq!(body["code"], "stream_limit_exceeded");
    assert_eq!(body["details"]["active_streams"], 2);
    assert_eq!(body["details"]["max_streams"], 2);

    first.close().await;
    second.close().await;

    let response = app
        .server
        .get("/api/v1/channels/news/stream")
        .authorization_bearer(&session)
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(slots.active("sub-1").await, 0);
}

#[tokio::test]
async fn disabled_limiter_allows_everything() {
    let mut config = test_config();
    config.limiter.backend = Some(LimiterBackend::Disabled);
    let app = TestApp::with_config(config).await;
    app.channel("news", "News", None, None).await;
    let session = app.session("sub-1", "basic").await;

    for _ in 0..120 {
        let response = app.server.get("/api/v1/me").authorization_bearer(&session).await;
        assert_eq!(response.status_code(), 200);
    }

    let entitlement = app.state.entitlements.for_subscriber("sub-1").await.unwrap();
    let _held = app
        .state
        .admission
        .slots()
        .check_and_reserve("sub-1", &entitlement)
        .await
        .unwrap();
    let response = app
        .server
        .get("/api/v1/channels/news/stream")
        .authorization_bearer(&session)
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn quality_outside_plan_is_forbidden() {
    let app = TestApp::spawn().await;
    app.channel("news", "News", None, None).await;
    let session = app.session("sub-1", "basic").await;

    let response = app
        .server
        .get("/api/v1/channels/news/stream")
        .add_query_param("quality", "hd")
        .authorization_bearer(&session)
        .await;

    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert_eq!(body["code"], "feature_not_permitted");
    assert_eq!(app.state.admission.slots().active("sub-1").await, 0);
}

#[tokio::test]
async fn unknown_quality_is_a_validation_error() {
    let app = TestApp::spawn().await;
    app.channel("news", "News", None, None).await;
    let session = app.session("sub-1", "premium").await;

    let response = app
        .server
        .get("/api/v1/channels/news/stream")
        .add_query_param("quality", "8k")
        .authorization_bearer(&session)
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn missing_signing_secret_fails_closed() {
    let mut config = test_config();
    config.signing.secret = None;
    let app = TestApp::with_config(config).await;
    app.channel("news", "News", None, None).await;
    let session = app.session("sub-1", "standard").await;

    let response = app
        .server
        .get("/api/v1/channels/news/stream")
        .authorization_bearer(&session)
        .await;

    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["code"], "signing_unavailable");
    assert_eq!(app.state.admission.slots().active("sub-1").await, 0);
}
