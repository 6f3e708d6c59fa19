//! Web layer
//!
//! Thin handlers over the service layer. Three front doors share one
//! session, admission and signing core:
//! - native JSON API under `/api/v1`
//! - M3U playlist at `/playlist.m3u` with its `/stream/{id}` redirects
//! - Xtream Codes emulation at `/player_api.php` and `/<prefix>/...`
//!
//! Signed capability URLs are served from `/play`.

use anyhow::{Context, Result};
use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::{
    config::Config,
    database::{
        Database,
        repositories::{
            ChannelSeaOrmRepository, CredentialSeaOrmRepository, EpgProgramSeaOrmRepository,
            SessionSeaOrmRepository, StreamIdSeaOrmRepository,
        },
    },
    playlist::PlaylistGenerator,
    services::{
        AdmissionController, BackgroundTasks, CapabilitySigner, CatalogService,
        CredentialService, EntitlementService, PlanCache, PlaybackService, SessionStore,
    },
    utils::SharedClock,
    xtream::XtreamService,
};

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod responses;

pub use responses::{ApiResponse, ErrorResponse};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Database,
    pub sessions: SessionStore,
    pub credentials: CredentialService,
    pub entitlements: EntitlementService,
    pub admission: AdmissionController,
    pub catalog: CatalogService,
    pub playback: PlaybackService,
    pub signer: CapabilitySigner,
    pub playlist: PlaylistGenerator,
    pub xtream: XtreamService,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Wire the service graph
    pub fn new(
        config: Config,
        database: Database,
        admission: AdmissionController,
        background: BackgroundTasks,
        clock: SharedClock,
    ) -> Result<Self> {
        let connection = database.connection();
        let base_url = url::Url::parse(config.web.base_url_trimmed())
            .with_context(|| format!("Invalid web.base_url '{}'", config.web.base_url))?;

        let sessions = SessionStore::new(
            SessionSeaOrmRepository::new(connection.clone()),
            background,
            clock.clone(),
            config.sessions.ttl,
        )?;

        let credential_repository = CredentialSeaOrmRepository::new(connection.clone());
        let credentials = CredentialService::new(
            credential_repository.clone(),
            clock.clone(),
            config.xtream.credential_prefix.clone(),
        );
        let entitlements = EntitlementService::new(
            credential_repository,
            Arc::new(PlanCache::new(
                config.entitlements.cache_capacity,
                config.entitlements.cache_ttl,
                clock.clone(),
            )),
            clock.clone(),
        );

        let catalog = CatalogService::new(
            ChannelSeaOrmRepository::new(connection.clone()),
            StreamIdSeaOrmRepository::new(connection.clone()),
            EpgProgramSeaOrmRepository::new(connection),
            clock.clone(),
        );

        let signer = CapabilitySigner::new(
            config.signing.secret.clone(),
            config.stream_base_url(),
            clock.clone(),
        );
        let playback = PlaybackService::new(
            catalog.clone(),
            entitlements.clone(),
            admission.slots().clone(),
            signer.clone(),
            config.signing.capability_ttl,
        );

        let xtream = XtreamService::new(
            credentials.clone(),
            entitlements.clone(),
            catalog.clone(),
            playback.clone(),
            admission.slots().clone(),
            config.xtream.clone(),
            base_url,
            clock,
        );

        let http_client = reqwest::Client::builder()
            .connect_timeout(config.web.request_timeout)
            .user_agent(concat!("iptv-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            playlist: PlaylistGenerator::new(config.web.base_url_trimmed()),
            config: Arc::new(config),
            database,
            sessions,
            credentials,
            entitlements,
            admission,
            catalog,
            playback,
            signer,
            xtream,
            http_client,
        })
    }
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", state.config.web.host, state.config.web.port)
            .parse()
            .context("Invalid listen address")?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Serve until `cancellation_token` fires, then drain in-flight requests
    pub async fn serve_with_cancellation(self, cancellation_token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind to {}", self.addr))?;
        info!("Web server listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                cancellation_token.cancelled().await;
                info!("Web server received cancellation signal, shutting down gracefully");
            })
            .await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/api/v1/sessions/current", delete(handlers::sessions::revoke_session))
        .route("/api/v1/me", get(handlers::sessions::me))
        .route("/api/v1/channels", get(handlers::channels::list_channels))
        .route(
            "/api/v1/channels/{channel_id}/stream",
            get(handlers::channels::channel_stream),
        )
        .route(
            "/api/v1/channels/{channel_id}/epg",
            get(handlers::channels::channel_epg),
        )
        .route("/playlist.m3u", get(handlers::playlist::playlist))
        .route("/stream/{channel_id}", get(handlers::playlist::stream_redirect))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth_middleware,
        ));

    let xtream_stream_route = format!(
        "/{}/{{username}}/{{password}}/{{stream_file}}",
        state.config.xtream.stream_path_prefix.trim_matches('/')
    );

    let timed_routes = Router::new()
        .route("/api/v1/sessions", post(handlers::sessions::create_session))
        .merge(session_routes)
        .route(
            "/player_api.php",
            get(handlers::xtream::player_api).post(handlers::xtream::player_api_form),
        )
        .route(&xtream_stream_route, get(handlers::xtream::stream_redirect))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::timeout_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/live", get(handlers::health::liveness_check))
        .merge(timed_routes)
        // Relay streams outlive any request timeout
        .route(
            "/play/channels/{channel_id}/{quality}",
            get(handlers::play::play_channel),
        )
        .merge(openapi::swagger_routes())
        .layer(CorsLayer::permissive())
        .layer(axum_middleware::from_fn(middleware::request_logging_middleware))
        .with_state(state)
}
