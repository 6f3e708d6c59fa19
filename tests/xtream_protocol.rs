mod common;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Duration;
use serde_json::Value;

use common::{BASE_URL, TestApp, query_param};
use iptv_gateway::{
    database::repositories::{ChannelSeaOrmRepository, EpgProgramSeaOrmRepository},
    models::EpgProgram,
};
use sea_orm::ConnectionTrait;

async fn player_api(app: &TestApp, username: &str, action: Option<&str>) -> Value {
    let mut request = app
        .server
        .get("/player_api.php")
        .add_query_param("username", username)
        .add_query_param("password", "anything");
    if let Some(action) = action {
        request = request.add_query_param("action", action);
    }
    let response = request.await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    response.json()
}

async fn seeded() -> (TestApp, String) {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", Some("News"), Some(2)).await;
    app.channel("sky-sports", "Sky Sports", Some("Sports"), Some(1)).await;
    app.channel("local", "Local Access", None, None).await;
    let api_token = app.subscriber("sub-1", "standard").await;
    (app, api_token)
}

#[tokio::test]
async fn bad_credentials_answer_200_with_auth_zero() {
    let (app, _) = seeded().await;

    for username in ["", "someone", "gw_unknown-token"] {
        let body = player_api(&app, username, None).await;
        assert_eq!(body["user_info"]["auth"], 0, "username {username:?}");
    }
}

#[tokio::test]
async fn login_reports_account_and_server() {
    let (app, api_token) = seeded().await;

    let body = player_api(&app, &api_token, None).await;
    let user = &body["user_info"];
    assert_eq!(user["auth"], 1);
    assert_eq!(user["status"], "Active");
    assert_eq!(user["username"], api_token.as_str());
    assert_eq!(user["max_connections"], "2");
    assert_eq!(user["active_cons"], "0");

    let server = &body["server_info"];
    assert_eq!(server["url"], "tv.example.com");
    assert_eq!(server["server_protocol"], "https");
    assert_eq!(server["https_port"], "443");
    assert_eq!(server["timestamp_now"], app.now().timestamp());
}

#[tokio::test]
async fn post_form_is_accepted() {
    let (app, api_token) = seeded().await;

    let response = app
        .server
        .post("/player_api.php")
        .form(&[("username", api_token.as_str()), ("password", "x")])
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["user_info"]["auth"], 1);
}

#[tokio::test]
async fn categories_and_streams_line_up() {
    let (app, api_token) = seeded().await;

    let categories = player_api(&app, &api_token, Some("get_live_categories")).await;
    let names: Vec<&str> = categories
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["category_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["News", "Sports", "Uncategorized"]);
    assert_eq!(categories[0]["category_id"], "1");

    let streams = player_api(&app, &api_token, Some("get_live_streams")).await;
    let streams = streams.as_array().unwrap();
    assert_eq!(streams.len(), 3);
    // Numbered channels first, then by name
    assert_eq!(streams[0]["name"], "Sky Sports");
    assert_eq!(streams[0]["category_id"], "2");
    assert_eq!(streams[1]["name"], "BBC News");
    assert_eq!(streams[2]["name"], "Local Access");
    assert_eq!(streams[2]["category_id"], "3");
    for stream in streams {
        assert!(stream["stream_id"].as_i64().unwrap() > 0);
        assert_eq!(stream["direct_source"], "");
    }

    let response = app
        .server
        .get("/player_api.php")
        .add_query_param("username", &api_token)
        .add_query_param("password", "x")
        .add_query_param("action", "get_live_streams")
        .add_query_param("category_id", "1")
        .await;
    let news: Value = response.json();
    assert_eq!(news.as_array().unwrap().len(), 1);
    assert_eq!(news[0]["name"], "BBC News");
}

#[tokio::test]
async fn stream_ids_survive_catalog_changes() {
    let (app, api_token) = seeded().await;

    let ids = |streams: &Value| -> Vec<(String, i64)> {
        streams
            .as_array()
            .unwrap()
            .iter()
            .map(|s| (s["name"].as_str().unwrap().to_string(), s["stream_id"].as_i64().unwrap()))
            .collect()
    };

    let before = ids(&player_api(&app, &api_token, Some("get_live_streams")).await);
    app.channel("aaa-first", "AAA First", Some("News"), Some(0)).await;
    let after = ids(&player_api(&app, &api_token, Some("get_live_streams")).await);

    for (name, id) in &before {
        assert!(after.contains(&(name.clone(), *id)), "{name} changed id");
    }
    assert_eq!(after.len(), before.len() + 1);
}

#[tokio::test]
async fn unsupported_actions_return_empty() {
    let (app, api_token) = seeded().await;

    assert_eq!(player_api(&app, &api_token, Some("get_vod_streams")).await, Value::Array(vec![]));
    assert_eq!(player_api(&app, &api_token, Some("get_series")).await, Value::Array(vec![]));
    assert_eq!(player_api(&app, &api_token, Some("no_such_action")).await, Value::Array(vec![]));
    assert!(player_api(&app, &api_token, Some("get_vod_info")).await.as_object().unwrap().is_empty());
}

#[tokio::test]
async fn stream_url_redirects_to_signed_capability() {
    let (app, api_token) = seeded().await;
    let streams = player_api(&app, &api_token, Some("get_live_streams")).await;
    let news = streams
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "BBC News")
        .unwrap();
    let stream_id = news["stream_id"].as_i64().unwrap();

    let response = app
        .server
        .get(&format!("/live/{api_token}/ignored/{stream_id}.ts"))
        .await;

    assert_eq!(response.status_code(), 302);
    let location = response.headers().get("location").unwrap().to_str().unwrap().to_string();
    // Standard plan streams in HD
    assert!(location.starts_with(&format!("{BASE_URL}/play/channels/bbc-news/hd?")));
    assert!(!location.contains("origin.internal"));
    assert!(query_param(&location, "sig").is_some());
    assert_eq!(
        query_param(&location, "expires").unwrap(),
        (app.now() + Duration::minutes(30)).timestamp().to_string()
    );
}

#[tokio::test]
async fn stream_url_with_bad_credentials_is_rejected() {
    let (app, _) = seeded().await;

    let response = app.server.get("/live/gw_nobody/x/1.ts").await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn short_epg_is_base64_encoded() {
    let (app, api_token) = seeded().await;
    EpgProgramSeaOrmRepository::new(app.state.database.connection())
        .create(&EpgProgram {
            id: "prog-1".into(),
            channel_id: "bbc-news".into(),
            title: "Evening News".into(),
            description: Some("Headlines & weather".into()),
            start_time: app.now() - Duration::minutes(30),
            end_time: app.now() + Duration::minutes(30),
        })
        .await
        .unwrap();

    let streams = player_api(&app, &api_token, Some("get_live_streams")).await;
    let stream_id = streams
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "BBC News")
        .unwrap()["stream_id"]
        .as_i64()
        .unwrap();

    let response = app
        .server
        .get("/player_api.php")
        .add_query_param("username", &api_token)
        .add_query_param("password", "x")
        .add_query_param("action", "get_short_epg")
        .add_query_param("stream_id", stream_id)
        .await;
    let body: Value = response.json();
    let listings = body["epg_listings"].as_array().unwrap();
    assert_eq!(listings.len(), 1);

    let title = STANDARD.decode(listings[0]["title"].as_str().unwrap()).unwrap();
    assert_eq!(String::from_utf8(title).unwrap(), "Evening News");
    let description = STANDARD
        .decode(listings[0]["description"].as_str().unwrap())
        .unwrap();
    assert_eq!(String::from_utf8(description).unwrap(), "Headlines & weather");
    assert_eq!(listings[0]["epg_id"], "bbc-news.tv");
}

#[tokio::test]
async fn basic_plan_gets_empty_epg() {
    let app = TestApp::spawn().await;
    app.channel("bbc-news", "BBC News", Some("News"), None).await;
    let api_token = app.subscriber("sub-basic", "basic").await;

    let body = player_api(&app, &api_token, Some("get_short_epg")).await;
    assert!(body["epg_listings"].as_array().unwrap().is_empty());
}

async fn seed_program_and_stream_id(app: &TestApp, api_token: &str) -> i64 {
    EpgProgramSeaOrmRepository::new(app.state.database.connection())
        .create(&EpgProgram {
            id: "prog-1".into(),
            channel_id: "bbc-news".into(),
            title: "Evening News".into(),
            description: None,
            start_time: app.now() - Duration::minutes(30),
            end_time: app.now() + Duration::minutes(30),
        })
        .await
        .unwrap();

    let streams = player_api(app, api_token, Some("get_live_streams")).await;
    streams
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "BBC News")
        .unwrap()["stream_id"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn short_epg_for_inactive_channel_uses_channel_id() {
    let (app, api_token) = seeded().await;
    let stream_id = seed_program_and_stream_id(&app, &api_token).await;
    ChannelSeaOrmRepository::new(app.state.database.connection())
        .set_active("bbc-news", false, app.now())
        .await
        .unwrap();

    let response = app
        .server
        .get("/player_api.php")
        .add_query_param("username", &api_token)
        .add_query_param("password", "x")
        .add_query_param("action", "get_short_epg")
        .add_query_param("stream_id", stream_id)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["epg_listings"][0]["epg_id"], "bbc-news");
}

#[tokio::test]
async fn short_epg_surfaces_catalog_failures() {
    let (app, api_token) = seeded().await;
    let stream_id = seed_program_and_stream_id(&app, &api_token).await;
    app.state
        .database
        .connection()
        .execute_unprepared("ALTER TABLE channels RENAME TO channels_offline")
        .await
        .unwrap();

    let response = app
        .server
        .get("/player_api.php")
        .add_query_param("username", &api_token)
        .add_query_param("password", "x")
        .add_query_param("action", "get_short_epg")
        .add_query_param("stream_id", stream_id)
        .await;
    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["code"], "database_error");
}
