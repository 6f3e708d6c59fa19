//! Health check handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::web::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    /// `redis`, `memory` or `disabled`
    pub limiter_backend: String,
    pub signing_configured: bool,
    pub timestamp: DateTime<Utc>,
}

/// Readiness: the durable store must answer. The limiter store is best effort and not checked.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Gateway healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let (status, database) = match state.database.ping().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };

    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        limiter_backend: state.admission.backend_name().to_string(),
        signing_configured: state.signer.is_configured(),
        timestamp: Utc::now(),
    };
    (status, Json(body)).into_response()
}

#[utoipa::path(get, path = "/live", tag = "health", responses((status = 200, description = "Process is alive")))]
pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
