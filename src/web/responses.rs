//! HTTP response types and error mapping
//!
//! Every failure leaves the gateway as
//! `{success: false, error, code, details, timestamp}`. Both limiters answer
//! 429 and are told apart by `code`.

use axum::{
    Json,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::admission::RateLimitInfo;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Standard success envelope
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Error envelope
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// Machine-readable error code, e.g. `rate_limit_exceeded` or `stream_limit_exceeded`
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Plain 302 with a `Location` header
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => AppError::internal("Redirect target is not a valid header value").into_response(),
    }
}

/// Attach budget state to a response
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset_at));
}

pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::AuthInvalid => StatusCode::UNAUTHORIZED,
        AppError::RateLimitExceeded { .. } | AppError::AdmissionDenied { .. } => {
            StatusCode::TOO_MANY_REQUESTS
        }
        AppError::FeatureNotPermitted { .. }
        | AppError::InvalidSignature
        | AppError::CapabilityExpired => StatusCode::FORBIDDEN,
        AppError::SigningUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        AppError::NotFound { .. } | AppError::ChannelUnavailable { .. } => StatusCode::NOT_FOUND,
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        AppError::StoreUnavailable { .. }
        | AppError::Configuration { .. }
        | AppError::Database(_)
        | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details_for(error: &AppError) -> Option<serde_json::Value> {
    match error {
        AppError::RateLimitExceeded {
            limit,
            retry_after,
            reset_at,
        } => Some(json!({ "limit": limit, "retry_after": retry_after, "reset_at": reset_at })),
        AppError::AdmissionDenied {
            active,
            limit,
            plan,
        } => Some(json!({
            "active_streams": active,
            "max_streams": limit,
            "plan": plan,
            "hint": "Stop playback on another device or upgrade your plan for more simultaneous streams",
        })),
        AppError::FeatureNotPermitted { feature, plan } => {
            Some(json!({ "feature": feature, "plan": plan }))
        }
        AppError::NotFound { resource, id } => Some(json!({ "resource": resource, "id": id })),
        _ => None,
    }
}

/// Client-facing message. Server-side failures are not described.
fn message_for(error: &AppError) -> String {
    match error {
        AppError::Database(_) => "Database operation failed".to_string(),
        AppError::StoreUnavailable { .. } => "Session store unavailable".to_string(),
        AppError::Internal { .. } | AppError::Configuration { .. } => {
            "Internal server error".to_string()
        }
        AppError::Upstream { .. } => "Stream origin unavailable".to_string(),
        other => other.to_string(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!(code = self.code(), "Request failed: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: message_for(&self),
            code: self.code().to_string(),
            details: details_for(&self),
            timestamp: Utc::now(),
        };
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimitExceeded {
            limit,
            retry_after,
            reset_at,
        } = self
        {
            let headers = response.headers_mut();
            apply_rate_limit_headers(
                headers,
                &RateLimitInfo {
                    limit,
                    remaining: 0,
                    reset_at,
                },
            );
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::AuthInvalid, StatusCode::UNAUTHORIZED)]
    #[case(AppError::AdmissionDenied { active: 2, limit: 2, plan: "standard".into() }, StatusCode::TOO_MANY_REQUESTS)]
    #[case(AppError::FeatureNotPermitted { feature: "hd".into(), plan: "basic".into() }, StatusCode::FORBIDDEN)]
    #[case(AppError::SigningUnavailable, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(AppError::CapabilityExpired, StatusCode::FORBIDDEN)]
    #[case(AppError::store_unavailable("down"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(AppError::ChannelUnavailable { id: "x".into() }, StatusCode::NOT_FOUND)]
    fn maps_errors_to_status(#[case] error: AppError, #[case] expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[test]
    fn rate_limit_rejection_carries_headers() {
        let response = AppError::RateLimitExceeded {
            limit: 100,
            retry_after: 17,
            reset_at: 1_700_000_040,
        }
        .into_response();

        let headers = response.headers();
        assert_eq!(headers[header::RETRY_AFTER], "17");
        assert_eq!(headers[X_RATELIMIT_LIMIT], "100");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[X_RATELIMIT_RESET], "1700000040");
    }
}
