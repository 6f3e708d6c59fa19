//! Capability URL endpoint
//!
//! Verification is signature and expiry only, no session lookup. The origin
//! stream is relayed so its location never reaches the client.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, warn};
use utoipa::IntoParams;

use crate::errors::{AppError, AppResult};
use crate::models::StreamQuality;
use crate::services::signer::channel_selector;
use crate::web::{AppState, responses::ErrorResponse};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CapabilityParams {
    pub expires: Option<i64>,
    pub sig: Option<String>,
}

#[utoipa::path(
    get,
    path = "/play/channels/{channel_id}/{quality}",
    tag = "playback",
    params(
        ("channel_id" = String, Path, description = "Catalog channel id"),
        ("quality" = String, Path, description = "sd, hd or uhd"),
        CapabilityParams
    ),
    responses(
        (status = 200, description = "Relayed stream bytes"),
        (status = 403, description = "Signature invalid or expired", body = ErrorResponse),
        (status = 404, description = "Channel no longer available", body = ErrorResponse),
        (status = 502, description = "Origin unreachable", body = ErrorResponse)
    )
)]
pub async fn play_channel(
    State(state): State<AppState>,
    Path((channel_id, quality)): Path<(String, String)>,
    Query(params): Query<CapabilityParams>,
) -> AppResult<Response> {
    let quality = StreamQuality::from_str(&quality).map_err(|_| AppError::InvalidSignature)?;
    let (Some(expires), Some(sig)) = (params.expires, params.sig) else {
        return Err(AppError::InvalidSignature);
    };

    state
        .signer
        .verify(&channel_selector(&channel_id, quality), expires, &sig)?;

    let channel = state.catalog.playable_channel(&channel_id).await?;
    debug!(channel_id = %channel.id, quality = %quality, "Relaying capability stream");

    let upstream = state
        .http_client
        .get(&channel.origin_url)
        .send()
        .await
        .map_err(|e| {
            warn!(channel_id = %channel.id, "Origin request failed: {}", e.without_url());
            AppError::Upstream {
                message: format!("origin request failed for channel {}", channel.id),
            }
        })?;

    if !upstream.status().is_success() {
        warn!(
            channel_id = %channel.id,
            status = upstream.status().as_u16(),
            "Origin answered with an error"
        );
        return Err(AppError::Upstream {
            message: format!("origin returned {} for channel {}", upstream.status(), channel.id),
        });
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("video/mp2t"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::internal(format!("Failed to build relay response: {e}")))
}
