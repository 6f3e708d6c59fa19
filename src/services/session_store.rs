//! Session issuance and validation
//!
//! Sessions are opaque random tokens. Validity is a durable lookup plus an
//! expiry comparison; there is nothing to verify cryptographically. Only the
//! SHA-256 of a token is stored, so a leaked table does not leak sessions.
//!
//! The durable store is a hard dependency: failures surface as
//! `StoreUnavailable` and are never treated as a valid session.

use chrono::Duration as ChronoDuration;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::database::repositories::SessionSeaOrmRepository;
use crate::errors::{AppError, AppResult};
use crate::models::{DeviceInfo, Session, SessionGrant};
use crate::services::background::BackgroundTasks;
use crate::services::scheduler::ScheduledTask;
use crate::utils::{SharedClock, generate_token, hash_token, log_prefix};

const MAX_DEVICE_FIELD_LEN: usize = 256;

#[derive(Clone)]
pub struct SessionStore {
    repository: SessionSeaOrmRepository,
    background: BackgroundTasks,
    clock: SharedClock,
    ttl: ChronoDuration,
}

impl SessionStore {
    pub fn new(
        repository: SessionSeaOrmRepository,
        background: BackgroundTasks,
        clock: SharedClock,
        ttl: Duration,
    ) -> AppResult<Self> {
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| AppError::configuration(format!("Session TTL out of range: {e}")))?;
        Ok(Self {
            repository,
            background,
            clock,
            ttl,
        })
    }

    /// Issue a new session for an already-authenticated subscriber
    pub async fn issue(&self, subscriber_id: &str, device: &DeviceInfo) -> AppResult<SessionGrant> {
        validate_device(device)?;

        let token = generate_token();
        let issued_at = self.clock.now();
        let session = Session {
            subscriber_id: subscriber_id.to_string(),
            device_id: device.device_id.clone(),
            platform: device.platform.clone(),
            client_version: device.client_version.clone(),
            issued_at,
            expires_at: issued_at + self.ttl,
            last_used_at: issued_at,
        };

        self.repository
            .insert(&hash_token(&token), &session)
            .await
            .map_err(|e| {
                error!(subscriber_id = %subscriber_id, "Failed to persist session: {}", e);
                AppError::store_unavailable(e)
            })?;

        info!(
            subscriber_id = %subscriber_id,
            device_id = %device.device_id,
            platform = %device.platform,
            token = %log_prefix(&token),
            "Session issued"
        );

        Ok(SessionGrant {
            token,
            expires_at: session.expires_at,
        })
    }

    /// Resolve a session token.
    ///
    /// Unknown and expired tokens both yield `AuthInvalid`. On success a
    /// `last_used_at` update is queued; its outcome cannot affect the result.
    pub async fn validate(&self, token: &str) -> AppResult<Session> {
        if token.is_empty() {
            return Err(AppError::AuthInvalid);
        }

        let token_hash = hash_token(token);
        let session = self
            .repository
            .find_by_hash(&token_hash)
            .await
            .map_err(|e| {
                error!(token = %log_prefix(token), "Session lookup failed: {}", e);
                AppError::store_unavailable(e)
            })?
            .ok_or(AppError::AuthInvalid)?;

        let now = self.clock.now();
        if now >= session.expires_at {
            debug!(token = %log_prefix(token), "Rejected expired session");
            return Err(AppError::AuthInvalid);
        }

        let repository = self.repository.clone();
        self.background.submit("session_touch", async move {
            repository.touch(&token_hash, now).await?;
            Ok(())
        });

        Ok(session)
    }

    /// Delete a session. Returns whether it existed.
    pub async fn revoke(&self, token: &str) -> AppResult<bool> {
        let removed = self
            .repository
            .delete(&hash_token(token))
            .await
            .map_err(AppError::store_unavailable)?;
        if removed {
            info!(token = %log_prefix(token), "Session revoked");
        }
        Ok(removed)
    }

    /// Remove sessions that expired more than `grace` ago
    pub async fn sweep_expired(&self, grace: Duration) -> AppResult<u64> {
        let grace = ChronoDuration::from_std(grace).unwrap_or(ChronoDuration::zero());
        let cutoff = self.clock.now() - grace;
        let removed = self
            .repository
            .delete_expired_before(cutoff)
            .await
            .map_err(AppError::store_unavailable)?;
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Swept expired sessions");
        }
        Ok(removed)
    }

    /// Start the periodic sweep
    pub fn spawn_sweeper(
        &self,
        period: Duration,
        grace: Duration,
        parent: &CancellationToken,
    ) -> ScheduledTask {
        let store = self.clone();
        ScheduledTask::spawn("session_sweeper", period, parent, move || {
            let store = store.clone();
            async move {
                store.sweep_expired(grace).await?;
                Ok(())
            }
        })
    }
}

fn validate_device(device: &DeviceInfo) -> AppResult<()> {
    if device.device_id.trim().is_empty() {
        return Err(AppError::validation("device_id is required"));
    }
    for (field, value) in [
        ("device_id", &device.device_id),
        ("platform", &device.platform),
        ("client_version", &device.client_version),
    ] {
        if value.len() > MAX_DEVICE_FIELD_LEN {
            return Err(AppError::validation(format!(
                "{field} must be at most {MAX_DEVICE_FIELD_LEN} bytes"
            )));
        }
    }
    Ok(())
}
