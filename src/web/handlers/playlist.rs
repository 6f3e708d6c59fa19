//! M3U playlist and its per-entry stream redirects

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use super::channels::StreamParams;
use crate::errors::AppResult;
use crate::playlist::M3U_CONTENT_TYPE;
use crate::web::{AppState, auth::SessionContext, responses::{ErrorResponse, found}};

#[utoipa::path(
    get,
    path = "/playlist.m3u",
    tag = "playlist",
    params(("token" = Option<String>, Query, description = "Session token when no Authorization header can be sent")),
    responses(
        (status = 200, description = "Extended M3U playlist", content_type = "audio/x-mpegurl", body = String),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    )
)]
pub async fn playlist(State(state): State<AppState>, context: SessionContext) -> AppResult<Response> {
    let channels = state.catalog.channels().await?;
    let body = state.playlist.render(&channels, &context.token);

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(M3U_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("inline; filename=\"playlist.m3u\""),
            ),
        ],
        body,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/stream/{channel_id}",
    tag = "playlist",
    params(
        ("channel_id" = String, Path, description = "Catalog channel id"),
        ("token" = Option<String>, Query, description = "Session token"),
        StreamParams
    ),
    responses(
        (status = 302, description = "Redirect to a signed playback URL"),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 429, description = "API or stream budget exhausted", body = ErrorResponse)
    )
)]
pub async fn stream_redirect(
    State(state): State<AppState>,
    context: SessionContext,
    Path(channel_id): Path<String>,
    Query(params): Query<StreamParams>,
) -> AppResult<Response> {
    let quality = params.parse_quality()?;
    let grant = state
        .playback
        .grant(&context.session.subscriber_id, &channel_id, quality)
        .await?;
    Ok(found(&grant.url))
}
