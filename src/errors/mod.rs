//! Centralized error handling for the gateway
//!
//! # Error Categories
//!
//! - **Authentication**: missing or expired sessions, bad capability signatures
//! - **Admission**: API budget and stream-slot budget rejections
//! - **Configuration**: signing secret missing, invalid settings
//! - **Storage**: durable store failures (never degraded)
//!
//! Ephemeral limiter store failures use [`LimiterError`] and are recovered
//! inside the admission controller.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for counter store operations
pub type LimiterResult<T> = Result<T, LimiterError>;
