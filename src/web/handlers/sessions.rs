//! Session issuance, introspection and revocation

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};
use crate::models::{DeviceInfo, Entitlement, SessionGrant};
use crate::web::{
    AppState,
    auth::{SessionContext, bearer_token},
    responses::{ApiResponse, ErrorResponse, created, ok},
};

/// Exchange a long-lived API token for a session.
///
/// The API token may be sent in the body or as a bearer token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub api_token: Option<String>,
    pub device_id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub client_version: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub subscriber_id: String,
    pub device_id: String,
    pub session_expires_at: DateTime<Utc>,
    pub entitlement: Entitlement,
    pub active_streams: u32,
}

#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session issued", body = ApiResponse<SessionGrant>),
        (status = 401, description = "Unknown, revoked or inactive API token", body = ErrorResponse),
        (status = 500, description = "Session store unavailable", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> AppResult<Response> {
    let api_token = request
        .api_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or(AppError::AuthInvalid)?;

    let subscription = state.credentials.authenticate(api_token.trim()).await?;
    // A fresh login should see the current plan
    state.entitlements.invalidate(&subscription.subscriber_id);

    let grant = state
        .sessions
        .issue(
            &subscription.subscriber_id,
            &DeviceInfo {
                device_id: request.device_id,
                platform: request.platform,
                client_version: request.client_version,
            },
        )
        .await?;

    Ok(created(grant))
}

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/current",
    tag = "sessions",
    security(("session_token" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    )
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    context: SessionContext,
) -> AppResult<Response> {
    state.sessions.revoke(&context.token).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "sessions",
    security(("session_token" = [])),
    responses(
        (status = 200, description = "Current subscriber, plan and stream usage", body = ApiResponse<MeResponse>),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 429, description = "API budget exhausted", body = ErrorResponse)
    )
)]
pub async fn me(State(state): State<AppState>, context: SessionContext) -> AppResult<Response> {
    let subscriber_id = context.session.subscriber_id;
    let entitlement = state.entitlements.for_subscriber(&subscriber_id).await?;
    let active_streams = state.admission.slots().active(&subscriber_id).await;

    Ok(ok(MeResponse {
        subscriber_id,
        device_id: context.session.device_id,
        session_expires_at: context.session.expires_at,
        entitlement,
        active_streams,
    }))
}
