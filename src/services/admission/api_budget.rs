//! Fixed-window API call budget per session
//!
//! Key: `ratelimit:api:<first 16 chars of token>:<floor(now / window)>`.
//! The bucket's TTL is set only by the increment that creates it, so ongoing
//! traffic can never push a window's reset further out.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::counter_store::{CounterStore, with_timeout};
use crate::errors::{AppError, AppResult};
use crate::utils::{SharedClock, hashing};

/// Characters of the session token used in the bucket key
pub const TOKEN_KEY_PREFIX_LEN: usize = 16;

/// Budget state to report in `X-RateLimit-*` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the current window ends
    pub reset_at: i64,
}

#[derive(Clone)]
pub struct ApiBudget {
    store: Arc<dyn CounterStore>,
    clock: SharedClock,
    limit: u32,
    window_secs: i64,
    margin: Duration,
    operation_timeout: Duration,
}

impl ApiBudget {
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: SharedClock,
        limit: u32,
        window: Duration,
        margin: Duration,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            limit,
            window_secs: window.as_secs().max(1) as i64,
            margin,
            operation_timeout,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one call against the session's current window.
    ///
    /// Store failures allow the call and report the full nominal budget.
    pub async fn check(&self, session_token: &str) -> AppResult<RateLimitInfo> {
        let now = self.clock.now().timestamp();
        let bucket = now.div_euclid(self.window_secs);
        let reset_at = (bucket + 1) * self.window_secs;
        let key = format!(
            "ratelimit:api:{}:{}",
            hashing::prefix(session_token, TOKEN_KEY_PREFIX_LEN),
            bucket
        );

        let count = match with_timeout("incr", self.operation_timeout, self.store.incr(&key)).await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    token = %hashing::log_prefix(session_token),
                    "API rate limiter unavailable, allowing request: {}",
                    e
                );
                return Ok(RateLimitInfo {
                    limit: self.limit,
                    remaining: self.limit,
                    reset_at,
                });
            }
        };

        if count == 1 {
            let ttl = Duration::from_secs(self.window_secs as u64) + self.margin;
            if let Err(e) =
                with_timeout("expire", self.operation_timeout, self.store.expire(&key, ttl)).await
            {
                warn!(bucket, "Failed to set rate limit window expiry: {}", e);
            }
        }

        if count > i64::from(self.limit) {
            let retry_after = (reset_at - now).max(1) as u64;
            debug!(
                token = %hashing::log_prefix(session_token),
                bucket,
                count,
                limit = self.limit,
                "API budget exhausted"
            );
            return Err(AppError::RateLimitExceeded {
                limit: self.limit,
                retry_after,
                reset_at,
            });
        }

        let used = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        Ok(RateLimitInfo {
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            reset_at,
        })
    }
}
