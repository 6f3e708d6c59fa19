//! Capability URL signing
//!
//! A capability URL is `<base>/<selector>?expires=<unix>&sig=<hex>` where
//! `sig = HMAC-SHA256(secret, "<selector>|<expires>")`. Possession of a valid,
//! unexpired URL is the authorization; verification does no I/O.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::models::StreamQuality;
use crate::utils::SharedClock;

type HmacSha256 = Hmac<Sha256>;

/// A freshly signed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless HMAC signer. Cheap to clone, safe to share across tasks.
#[derive(Clone)]
pub struct CapabilitySigner {
    secret: Option<Arc<[u8]>>,
    base_url: String,
    clock: SharedClock,
}

impl std::fmt::Debug for CapabilitySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySigner")
            .field("configured", &self.is_configured())
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Canonical selector for a channel stream at a given quality
pub fn channel_selector(channel_id: &str, quality: StreamQuality) -> String {
    format!("channels/{}/{}", channel_id, quality)
}

impl CapabilitySigner {
    pub fn new(secret: Option<String>, base_url: impl Into<String>, clock: SharedClock) -> Self {
        let secret = secret
            .filter(|s| !s.is_empty())
            .map(|s| Arc::from(s.into_bytes().into_boxed_slice()));
        Self {
            secret,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            clock,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Sign `selector` under the configured base URL
    pub fn sign(&self, selector: &str, ttl: Duration) -> AppResult<SignedUrl> {
        self.sign_with_base(&self.base_url, selector, ttl)
    }

    pub fn sign_with_base(
        &self,
        base_url: &str,
        selector: &str,
        ttl: Duration,
    ) -> AppResult<SignedUrl> {
        let ttl = ChronoDuration::from_std(ttl)
            .map_err(|e| AppError::internal(format!("Capability TTL out of range: {e}")))?;
        let expires_at = self.clock.now() + ttl;
        let expires = expires_at.timestamp();

        let signature = hex::encode(self.mac(selector, expires)?.finalize().into_bytes());

        let url = format!(
            "{}/{}?expires={}&sig={}",
            base_url.trim_end_matches('/'),
            encode_path(selector),
            expires,
            signature
        );

        Ok(SignedUrl {
            url,
            // Truncated to whole seconds so it matches what the URL carries
            expires_at: DateTime::from_timestamp(expires, 0).unwrap_or(expires_at),
        })
    }

    /// Check an expiry and signature for `selector`.
    ///
    /// Expiry is checked before the signature. Comparison is constant-time.
    pub fn verify(&self, selector: &str, expires: i64, sig: &str) -> AppResult<()> {
        if self.clock.now().timestamp() >= expires {
            return Err(AppError::CapabilityExpired);
        }

        let provided = hex::decode(sig).map_err(|_| AppError::InvalidSignature)?;
        self.mac(selector, expires)?
            .verify_slice(&provided)
            .map_err(|_| AppError::InvalidSignature)
    }

    fn mac(&self, selector: &str, expires: i64) -> AppResult<HmacSha256> {
        let secret = self.secret.as_deref().ok_or(AppError::SigningUnavailable)?;
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::internal(format!("HMAC error: {e}")))?;
        mac.update(selector.as_bytes());
        mac.update(b"|");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

fn encode_path(selector: &str) -> String {
    selector
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
