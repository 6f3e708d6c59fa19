//! Long-lived API credential checks
//!
//! API tokens are exchanged for sessions, and the xtream front door accepts
//! them directly. A token is valid when its hash matches a non-revoked row
//! and its subscriber has an active subscription.

use tracing::debug;

use crate::database::repositories::CredentialSeaOrmRepository;
use crate::errors::{AppError, AppResult};
use crate::models::Subscription;
use crate::utils::{SharedClock, generate_token, hash_token, log_prefix};

#[derive(Clone)]
pub struct CredentialService {
    repository: CredentialSeaOrmRepository,
    clock: SharedClock,
    token_prefix: String,
}

impl CredentialService {
    pub fn new(
        repository: CredentialSeaOrmRepository,
        clock: SharedClock,
        token_prefix: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            clock,
            token_prefix: token_prefix.into(),
        }
    }

    /// Prefix every API token carries, e.g. `gw_`
    pub fn token_prefix(&self) -> &str {
        &self.token_prefix
    }

    pub fn has_token_shape(&self, candidate: &str) -> bool {
        candidate.len() > self.token_prefix.len() && candidate.starts_with(&self.token_prefix)
    }

    /// Resolve an API token to its subscriber's active subscription
    pub async fn authenticate(&self, api_token: &str) -> AppResult<Subscription> {
        if api_token.is_empty() {
            return Err(AppError::AuthInvalid);
        }

        let subscriber_id = self
            .repository
            .find_unrevoked_subscriber(&hash_token(api_token))
            .await?
            .ok_or_else(|| {
                debug!(token = %log_prefix(api_token), "Unknown or revoked API token");
                AppError::AuthInvalid
            })?;

        let subscription = self
            .repository
            .find_subscription(&subscriber_id)
            .await?
            .filter(|s| s.is_active_at(self.clock.now()))
            .ok_or_else(|| {
                debug!(subscriber_id = %subscriber_id, "API token owner has no active subscription");
                AppError::AuthInvalid
            })?;

        Ok(subscription)
    }

    /// Create a new API token for a subscriber. The plaintext is returned once.
    pub async fn provision_token(&self, subscriber_id: &str, label: Option<String>) -> AppResult<String> {
        let token = format!("{}{}", self.token_prefix, generate_token());
        self.repository
            .create_token(subscriber_id, &hash_token(&token), label, self.clock.now())
            .await?;
        Ok(token)
    }

    pub async fn revoke_token(&self, api_token: &str) -> AppResult<bool> {
        Ok(self
            .repository
            .revoke_token(&hash_token(api_token), self.clock.now())
            .await?)
    }
}
