//! Error type definitions for the gateway
//!
//! The taxonomy mirrors the gateway's propagation policy: anything that could
//! grant access it should not fails closed and surfaces to the caller, while
//! failures of the best-effort limiter store stay inside the admission module.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing, unknown or expired session. Deliberately carries no detail about which.
    #[error("Authentication required")]
    AuthInvalid,

    /// Per-session API budget exhausted for the current window
    #[error("Rate limit exceeded: {limit} requests per window, retry after {retry_after}s")]
    RateLimitExceeded {
        limit: u32,
        retry_after: u64,
        reset_at: i64,
    },

    /// Concurrent stream-slot budget exhausted
    #[error("Stream limit reached: {active} of {limit} streams in use on plan '{plan}'")]
    AdmissionDenied {
        active: u32,
        limit: u32,
        plan: String,
    },

    /// The subscriber's plan does not include the requested feature
    #[error("Feature '{feature}' is not included in plan '{plan}'")]
    FeatureNotPermitted { feature: String, plan: String },

    /// No signing secret configured; capability URLs cannot be issued
    #[error("Playback signing is not configured")]
    SigningUnavailable,

    /// Capability signature did not match
    #[error("Invalid capability signature")]
    InvalidSignature,

    /// Capability URL used after its expiry
    #[error("Capability URL has expired")]
    CapabilityExpired,

    /// Durable session store rejected or failed an operation
    #[error("Session store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Catalog entry exists but is not currently playable
    #[error("Channel unavailable: {id}")]
    ChannelUnavailable { id: String },

    /// Origin stream could not be fetched for relay
    #[error("Upstream unavailable: {message}")]
    Upstream { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures of the ephemeral counter store.
///
/// These never reach a caller: the admission controller logs them and lets
/// the request through.
#[derive(Error, Debug)]
pub enum LimiterError {
    #[error("counter store operation '{operation}' failed: {message}")]
    Backend { operation: &'static str, message: String },

    #[error("counter store operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },
}

impl From<redis::RedisError> for LimiterError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend {
            operation: "redis",
            message: err.to_string(),
        }
    }
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Wrap a durable-store failure. Session issuance and validation treat these as hard errors.
    pub fn store_unavailable(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            message: err.to_string(),
        }
    }

    pub fn rate_limited(limit: u32, retry_after: u64, reset_at: DateTime<Utc>) -> Self {
        Self::RateLimitExceeded {
            limit,
            retry_after,
            reset_at: reset_at.timestamp(),
        }
    }

    /// Stable machine-readable code used in response bodies.
    ///
    /// Both limiters answer with 429, clients tell them apart by this code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthInvalid => "auth_invalid",
            AppError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AppError::AdmissionDenied { .. } => "stream_limit_exceeded",
            AppError::FeatureNotPermitted { .. } => "feature_not_permitted",
            AppError::SigningUnavailable => "signing_unavailable",
            AppError::InvalidSignature => "invalid_signature",
            AppError::CapabilityExpired => "capability_expired",
            AppError::StoreUnavailable { .. } => "store_unavailable",
            AppError::NotFound { .. } => "not_found",
            AppError::ChannelUnavailable { .. } => "channel_unavailable",
            AppError::Upstream { .. } => "upstream_unavailable",
            AppError::Validation { .. } => "validation_failed",
            AppError::Configuration { .. } => "configuration_error",
            AppError::Database(_) => "database_error",
            AppError::Internal { .. } => "internal_error",
        }
    }
}
