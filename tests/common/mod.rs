//! Shared harness for HTTP-level tests
#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use iptv_gateway::{
    config::{Config, LimiterBackend},
    database::{
        Database,
        repositories::{ChannelCreateRequest, ChannelSeaOrmRepository, CredentialSeaOrmRepository},
    },
    models::{Channel, Subscription},
    services::{
        AdmissionController, BackgroundTasks,
        admission::{CounterStore, MemoryCounterStore, NullCounterStore},
    },
    utils::{Clock, ManualClock},
    web::{AppState, create_router},
};

pub const BASE_URL: &str = "https://tv.example.com";
pub const SIGNING_SECRET: &str = "integration-secret";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: ManualClock,
    _shutdown: CancellationToken,
}

/// A fixed, minute-aligned start so API budget windows are predictable
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.web.base_url = BASE_URL.to_string();
    config.signing.secret = Some(SIGNING_SECRET.to_string());
    config.limiter.backend = Some(LimiterBackend::Memory);
    config
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store: Arc<dyn CounterStore> = match config.limiter.backend {
            Some(LimiterBackend::Disabled) => Arc::new(NullCounterStore),
            _ => Arc::new(MemoryCounterStore::new()),
        };
        Self::build(config, store).await
    }

    async fn build(config: Config, store: Arc<dyn CounterStore>) -> Self {
        let database = Database::new_in_memory().await.unwrap();
        let clock = ManualClock::new(start_time());
        let shared_clock = Arc::new(clock.clone());
        let shutdown = CancellationToken::new();

        let (background, _worker) = BackgroundTasks::spawn(
            config.sessions.touch_queue_capacity,
            config.sessions.touch_timeout,
            shutdown.clone(),
        );
        let admission = AdmissionController::new(store, &config.limiter, shared_clock.clone());
        let state = AppState::new(config, database, admission, background, shared_clock).unwrap();
        let server = TestServer::new(create_router(state.clone())).unwrap();

        Self {
            server,
            state,
            clock,
            _shutdown: shutdown,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create an active subscriber on `plan` and return a fresh API token for them
    pub async fn subscriber(&self, subscriber_id: &str, plan: &str) -> String {
        let repository = CredentialSeaOrmRepository::new(self.state.database.connection());
        repository
            .upsert_subscription(
                &Subscription {
                    subscriber_id: subscriber_id.to_string(),
                    plan_slug: plan.to_string(),
                    status: Subscription::ACTIVE_STATUS.to_string(),
                    current_period_end: Some(self.now() + Duration::days(30)),
                },
                self.now(),
            )
            .await
            .unwrap();
        self.state
            .credentials
            .provision_token(subscriber_id, Some("tests".to_string()))
            .await
            .unwrap()
    }

    pub async fn channel(&self, id: &str, name: &str, category: Option<&str>, number: Option<i32>) -> Channel {
        self.channel_with_origin(id, name, category, number, &format!("http://origin.internal/{id}.ts"))
            .await
    }

    pub async fn channel_with_origin(
        &self,
        id: &str,
        name: &str,
        category: Option<&str>,
        number: Option<i32>,
        origin_url: &str,
    ) -> Channel {
        ChannelSeaOrmRepository::new(self.state.database.connection())
            .create(
                ChannelCreateRequest {
                    id: Some(id.to_string()),
                    name: name.to_string(),
                    category: category.map(str::to_string),
                    tvg_id: Some(format!("{id}.tv")),
                    logo_url: None,
                    channel_number: number,
                    origin_url: origin_url.to_string(),
                    is_active: true,
                },
                self.now(),
            )
            .await
            .unwrap()
    }

    /// Exchange an API token for a session token over HTTP
    pub async fn login(&self, api_token: &str) -> String {
        let response = self
            .server
            .post("/api/v1/sessions")
            .json(&json!({
                "api_token": api_token,
                "device_id": "test-device",
                "platform": "linux",
                "client_version": "1.0.0"
            }))
            .await;
        assert_eq!(response.status_code(), 201, "login failed: {}", response.text());
        let body: Value = response.json();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Subscriber plus session in one step
    pub async fn session(&self, subscriber_id: &str, plan: &str) -> String {
        let api_token = self.subscriber(subscriber_id, plan).await;
        self.login(&api_token).await
    }
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
