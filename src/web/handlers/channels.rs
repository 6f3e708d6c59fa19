//! Native catalog and playback endpoints

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use std::str::FromStr;
use utoipa::IntoParams;

use crate::errors::{AppError, AppResult};
use crate::models::{Channel, EpgProgram, Feature, PlaybackGrant, StreamQuality};
use crate::services::EpgWindow;
use crate::web::{
    AppState,
    auth::SessionContext,
    responses::{ApiResponse, ErrorResponse, ok},
};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StreamParams {
    /// `sd` (default), `hd` or `uhd`
    pub quality: Option<String>,
}

impl StreamParams {
    pub fn parse_quality(&self) -> AppResult<StreamQuality> {
        match self.quality.as_deref().map(str::trim) {
            None | Some("") => Ok(StreamQuality::default()),
            Some(raw) => StreamQuality::from_str(raw)
                .map_err(|_| AppError::validation(format!("Unknown quality '{raw}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct EpgParams {
    /// Maximum number of programs, capped by server configuration
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/channels",
    tag = "channels",
    security(("session_token" = [])),
    responses(
        (status = 200, description = "Active channels in display order", body = ApiResponse<Vec<Channel>>),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 429, description = "API budget exhausted", body = ErrorResponse)
    )
)]
pub async fn list_channels(
    State(state): State<AppState>,
    _context: SessionContext,
) -> AppResult<Response> {
    Ok(ok(state.catalog.channels().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/channels/{channel_id}/stream",
    tag = "channels",
    security(("session_token" = [])),
    params(("channel_id" = String, Path, description = "Catalog channel id"), StreamParams),
    responses(
        (status = 200, description = "Signed playback URL", body = ApiResponse<PlaybackGrant>),
        (status = 403, description = "Quality not included in plan", body = ErrorResponse),
        (status = 404, description = "Unknown or inactive channel", body = ErrorResponse),
        (status = 429, description = "API or stream budget exhausted", body = ErrorResponse),
        (status = 503, description = "Signing not configured", body = ErrorResponse)
    )
)]
pub async fn channel_stream(
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
    Ok(ok(grant))
}

#[utoipa::path(
    get,
    path = "/api/v1/channels/{channel_id}/epg",
    tag = "channels",
    security(("session_token" = [])),
    params(("channel_id" = String, Path, description = "Catalog channel id"), EpgParams),
    responses(
        (status = 200, description = "Programs from 4h ago to 48h ahead", body = ApiResponse<Vec<EpgProgram>>),
        (status = 403, description = "Plan has no EPG access", body = ErrorResponse),
        (status = 404, description = "Unknown or inactive channel", body = ErrorResponse)
    )
)]
pub async fn channel_epg(
    State(state): State<AppState>,
    context: SessionContext,
    Path(channel_id): Path<String>,
    Query(params): Query<EpgParams>,
) -> AppResult<Response> {
    let entitlement = state
        .entitlements
        .for_subscriber(&context.session.subscriber_id)
        .await?;
    if !entitlement.allows(Feature::Epg) {
        return Err(AppError::FeatureNotPermitted {
            feature: Feature::Epg.to_string(),
            plan: entitlement.plan_slug,
        });
    }

    let channel = state.catalog.playable_channel(&channel_id).await?;
    let xtream = &state.config.xtream;
    let max_entries = params
        .limit
        .filter(|l| *l > 0)
        .map_or(xtream.epg_max_entries, |l| l.min(xtream.epg_max_entries));

    let programs = state
        .catalog
        .epg(
            &channel.id,
            EpgWindow {
                lookbehind: xtream.epg_lookbehind,
                lookahead: xtream.epg_lookahead,
                max_entries,
            },
        )
        .await?;
    Ok(ok(programs))
}
