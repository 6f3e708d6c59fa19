mod common;

use axum::{Router, http::header, routing::get};
use chrono::Duration;
use serde_json::Value;

use common::{BASE_URL, TestApp, query_param};

/// Ask the native API for a capability URL and split it into path, expires and sig
async fn capability(app: &TestApp, session: &str, channel_id: &str) -> (String, String, String) {
    let response = app
        .server
        .get(&format!("/api/v1/channels/{channel_id}/stream"))
        .authorization_bearer(session)
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    let url = body["data"]["url"].as_str().unwrap().to_string();
    let parsed = url::Url::parse(&url).unwrap();
    (
        parsed.path().to_string(),
        query_param(&url, "expires").unwrap(),
        query_param(&url, "sig").unwrap(),
    )
}

#[tokio::test]
async fn playlist_lists_gateway_urls_only() {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", Some("News"), Some(2)).await;
    app.channel("sky-sports", "Sky \"Sports\"", Some("Sports"), Some(1)).await;
    let session = app.session("sub-1", "standard").await;

    let response = app
        .server
        .get("/playlist.m3u")
        .add_query_param("token", &session)
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "audio/x-mpegurl");
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");

    let body = response.text();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("#EXTINF:-1"));
    assert!(lines[1].contains("tvg-name=\"Sky 'Sports'\""));
    assert!(lines[1].contains("group-title=\"Sports\""));
    assert_eq!(
        lines[2],
        format!("{BASE_URL}/stream/sky-sports?token={session}")
    );
    assert_eq!(
        lines[4],
        format!("{BASE_URL}/stream/bbc-news?token={session}")
    );
    assert!(!body.contains("origin.internal"));
}

#[tokio::test]
async fn playlist_accepts_bearer_and_rejects_anonymous() {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", None, None).await;
    let session = app.session("sub-1", "basic").await;

    let response = app.server.get("/playlist.m3u").authorization_bearer(&session).await;
    assert_eq!(response.status_code(), 200);

    let response = app.server.get("/playlist.m3u").await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn playlist_entry_redirects_to_capability() {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", None, None).await;
    let session = app.session("sub-1", "basic").await;

    let response = app
        .server
        .get("/stream/bbc-news")
        .add_query_param("token", &session)
        .await;

    assert_eq!(response.status_code(), 302);
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with(&format!("{BASE_URL}/play/channels/bbc-news/sd?expires=")));
    assert!(!location.contains(&session));
}

#[tokio::test]
async fn unknown_channel_is_not_found() {
    let app = TestApp::spawn().await;
    let session = app.session("sub-1", "basic").await;

    let response = app
        .server
        .get("/stream/missing")
        .add_query_param("token", &session)
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn tampered_capability_is_forbidden() {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", None, None).await;
    let session = app.session("sub-1", "basic").await;
    let (path, expires, sig) = capability(&app, &session, "bbc-news").await;

    let mut tampered = sig.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == '0' { '1' } else { '0' });
    let response = app
        .server
        .get(&path)
        .add_query_param("expires", &expires)
        .add_query_param("sig", &tampered)
        .await;
    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert_eq!(body["code"], "invalid_signature");

    // Same signature, different quality
    let response = app
        .server
        .get("/play/channels/bbc-news/hd")
        .add_query_param("expires", &expires)
        .add_query_param("sig", &sig)
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app.server.get(&path).await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn expired_capability_is_forbidden() {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", None, None).await;
    let session = app.session("sub-1", "basic").await;
    let (path, expires, sig) = capability(&app, &session, "bbc-news").await;

    app.clock.advance(Duration::minutes(31));
    let response = app
        .server
        .get(&path)
        .add_query_param("expires", &expires)
        .add_query_param("sig", &sig)
        .await;

    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert_eq!(body["code"], "capability_expired");
}

#[tokio::test]
async fn valid_capability_relays_origin_bytes() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let app = Router::new().route(
            "/bbc-news.ts",
            get(|| async { ([(header::CONTENT_TYPE, "video/mp2t")], "transport-stream-bytes") }),
        );
        axum::serve(listener, app).await.unwrap();
    });

    let app = TestApp::spawn().await;
    app.channel_with_origin(
        "bbc-news",
        "BBC News",
        None,
        None,
        &format!("http://{origin}/bbc-news.ts"),
    )
    .await;
    let session = app.session("sub-1", "basic").await;
    let (path, expires, sig) = capability(&app, &session, "bbc-news").await;

    let response = app
        .server
        .get(&path)
        .add_query_param("expires", &expires)
        .add_query_param("sig", &sig)
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "video/mp2t");
    assert_eq!(response.text(), "transport-stream-bytes");
}

#[tokio::test]
async fn unreachable_origin_is_bad_gateway() {
    // Bind and drop to get a port nothing listens on
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let app = TestApp::spawn().await;
    app.channel_with_origin("dead", "Dead", None, None, &format!("http://{closed}/dead.ts"))
        .await;
    let session = app.session("sub-1", "basic").await;
    let (path, expires, sig) = capability(&app, &session, "dead").await;

    let response = app
        .server
        .get(&path)
        .add_query_param("expires", &expires)
        .add_query_param("sig", &sig)
        .await;

    assert_eq!(response.status_code(), 502);
    let body: Value = response.json();
    assert_eq!(body["code"], "upstream_unavailable");
    assert!(!body.to_string().contains(&closed.to_string()));
}
