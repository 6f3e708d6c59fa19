//! OpenAPI document and Swagger UI

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use super::AppState;
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "IPTV Gateway API",
        description = "Subscriber sessions, admission control and signed playback URLs.\n\nThe Xtream Codes endpoints (`/player_api.php`, `/<prefix>/<token>/<password>/<stream_id>.<ext>`) follow that protocol's own contract and are not described here.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::health::health_check,
        handlers::health::liveness_check,
        handlers::sessions::create_session,
        handlers::sessions::revoke_session,
        handlers::sessions::me,
        handlers::channels::list_channels,
        handlers::channels::channel_stream,
        handlers::channels::channel_epg,
        handlers::playlist::playlist,
        handlers::playlist::stream_redirect,
        handlers::play::play_channel,
    ),
    components(schemas(
        crate::models::Channel,
        crate::models::DeviceInfo,
        crate::models::Entitlement,
        crate::models::EpgProgram,
        crate::models::Feature,
        crate::models::PlaybackGrant,
        crate::models::SessionGrant,
        crate::models::StreamQuality,
        handlers::health::HealthResponse,
        handlers::sessions::CreateSessionRequest,
        handlers::sessions::MeResponse,
        super::responses::ErrorResponse,
    )),
    modifiers(&SessionTokenAuth),
    tags(
        (name = "sessions", description = "API token exchange and session lifecycle"),
        (name = "channels", description = "Catalog, EPG and playback grants"),
        (name = "playlist", description = "M3U playlist front door"),
        (name = "playback", description = "Signed capability URLs"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SessionTokenAuth;

impl Modify for SessionTokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "session_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// `/docs` and `/api-docs/openapi.json`
pub fn swagger_routes() -> axum::Router<AppState> {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
