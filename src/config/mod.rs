use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub xtream: XtreamConfig,
    #[serde(default)]
    pub entitlements: EntitlementCacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used to build absolute references (playlist entries, xtream server_info)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "duration")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fixed lifetime of an issued session; sessions are never extended in place
    #[serde(default = "default_session_ttl", with = "duration")]
    pub ttl: Duration,
    #[serde(default = "default_sweep_interval", with = "duration")]
    pub sweep_interval: Duration,
    /// How long past expiry a session row is kept before the sweeper deletes it
    #[serde(default = "default_sweep_grace", with = "duration")]
    pub sweep_grace: Duration,
    #[serde(default = "default_touch_queue_capacity")]
    pub touch_queue_capacity: usize,
    #[serde(default = "default_touch_timeout", with = "duration")]
    pub touch_timeout: Duration,
}

/// Which counter store backs the admission controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LimiterBackend {
    Redis,
    Memory,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Explicit backend; when unset, `redis` if `redis_url` is present, otherwise `disabled`
    #[serde(default)]
    pub backend: Option<LimiterBackend>,
    #[serde(default = "default_api_requests_per_window")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_api_window", with = "duration")]
    pub api_window: Duration,
    #[serde(default = "default_window_margin", with = "duration")]
    pub window_margin: Duration,
    /// Must outlive any capability URL so an abandoned slot reclaims itself
    #[serde(default = "default_slot_ttl", with = "duration")]
    pub slot_ttl: Duration,
    #[serde(default = "default_operation_timeout", with = "duration")]
    pub operation_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_capability_ttl", with = "duration")]
    pub capability_ttl: Duration,
    #[serde(default)]
    pub stream_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XtreamConfig {
    /// API tokens presented as xtream usernames must carry this prefix
    #[serde(default = "default_credential_prefix")]
    pub credential_prefix: String,
    #[serde(default = "default_stream_path_prefix")]
    pub stream_path_prefix: String,
    #[serde(default = "default_xtream_timezone")]
    pub timezone: String,
    #[serde(default = "default_epg_lookbehind", with = "duration")]
    pub epg_lookbehind: Duration,
    #[serde(default = "default_epg_lookahead", with = "duration")]
    pub epg_lookahead: Duration,
    #[serde(default = "default_epg_max_entries")]
    pub epg_max_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementCacheConfig {
    #[serde(default = "default_entitlement_cache_ttl", with = "duration")]
    pub cache_ttl: Duration,
    #[serde(default = "default_entitlement_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_request_timeout() -> Duration {
    parse_default(DEFAULT_REQUEST_TIMEOUT)
}
fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}
fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}
fn default_session_ttl() -> Duration {
    parse_default(DEFAULT_SESSION_TTL)
}
fn default_sweep_interval() -> Duration {
    parse_default(DEFAULT_SWEEP_INTERVAL)
}
fn default_sweep_grace() -> Duration {
    parse_default(DEFAULT_SWEEP_GRACE)
}
fn default_touch_queue_capacity() -> usize {
    DEFAULT_TOUCH_QUEUE_CAPACITY
}
fn default_touch_timeout() -> Duration {
    parse_default(DEFAULT_TOUCH_TIMEOUT)
}
fn default_api_requests_per_window() -> u32 {
    DEFAULT_API_REQUESTS_PER_WINDOW
}
fn default_api_window() -> Duration {
    parse_default(DEFAULT_API_WINDOW)
}
fn default_window_margin() -> Duration {
    parse_default(DEFAULT_WINDOW_MARGIN)
}
fn default_slot_ttl() -> Duration {
    parse_default(DEFAULT_SLOT_TTL)
}
fn default_operation_timeout() -> Duration {
    parse_default(DEFAULT_LIMITER_OPERATION_TIMEOUT)
}
fn default_capability_ttl() -> Duration {
    parse_default(DEFAULT_CAPABILITY_TTL)
}
fn default_credential_prefix() -> String {
    DEFAULT_CREDENTIAL_PREFIX.to_string()
}
fn default_stream_path_prefix() -> String {
    DEFAULT_STREAM_PATH_PREFIX.to_string()
}
fn default_xtream_timezone() -> String {
    DEFAULT_XTREAM_TIMEZONE.to_string()
}
fn default_epg_lookbehind() -> Duration {
    parse_default(DEFAULT_EPG_LOOKBEHIND)
}
fn default_epg_lookahead() -> Duration {
    parse_default(DEFAULT_EPG_LOOKAHEAD)
}
fn default_epg_max_entries() -> u64 {
    DEFAULT_EPG_MAX_ENTRIES
}
fn default_entitlement_cache_ttl() -> Duration {
    parse_default(DEFAULT_ENTITLEMENT_CACHE_TTL)
}
fn default_entitlement_cache_capacity() -> usize {
    DEFAULT_ENTITLEMENT_CACHE_CAPACITY
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: default_session_ttl(),
            sweep_interval: default_sweep_interval(),
            sweep_grace: default_sweep_grace(),
            touch_queue_capacity: default_touch_queue_capacity(),
            touch_timeout: default_touch_timeout(),
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            backend: None,
            api_requests_per_window: default_api_requests_per_window(),
            api_window: default_api_window(),
            window_margin: default_window_margin(),
            slot_ttl: default_slot_ttl(),
            operation_timeout: default_operation_timeout(),
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: None,
            capability_ttl: default_capability_ttl(),
            stream_base_url: None,
        }
    }
}

impl Default for XtreamConfig {
    fn default() -> Self {
        Self {
            credential_prefix: default_credential_prefix(),
            stream_path_prefix: default_stream_path_prefix(),
            timezone: default_xtream_timezone(),
            epg_lookbehind: default_epg_lookbehind(),
            epg_lookahead: default_epg_lookahead(),
            epg_max_entries: default_epg_max_entries(),
        }
    }
}

impl Default for EntitlementCacheConfig {
    fn default() -> Self {
        Self {
            cache_ttl: default_entitlement_cache_ttl(),
            cache_capacity: default_entitlement_cache_capacity(),
        }
    }
}

impl LimiterConfig {
    pub fn effective_backend(&self) -> LimiterBackend {
        match (self.backend, self.redis_url.as_deref()) {
            (Some(backend), _) => backend,
            (None, Some(url)) if !url.trim().is_empty() => LimiterBackend::Redis,
            (None, _) => LimiterBackend::Disabled,
        }
    }
}

impl WebConfig {
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML file (if it exists), then `GATEWAY_*` env vars.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        } else {
            info!(
                "Configuration file {} not found, using defaults and environment",
                path.display()
            );
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.web.base_url)
            .with_context(|| format!("web.base_url '{}' is not a valid URL", self.web.base_url))?;
        if base.cannot_be_a_base() {
            bail!("web.base_url '{}' must be an absolute URL", self.web.base_url);
        }

        if self.limiter.api_requests_per_window == 0 {
            bail!("limiter.api_requests_per_window must be greater than zero");
        }
        if self.limiter.api_window < Duration::from_secs(1) {
            bail!("limiter.api_window must be at least 1s");
        }
        if self.signing.capability_ttl >= self.limiter.slot_ttl {
            bail!(
                "signing.capability_ttl ({}) must be shorter than limiter.slot_ttl ({})",
                humantime::format_duration(self.signing.capability_ttl),
                humantime::format_duration(self.limiter.slot_ttl)
            );
        }
        if self.limiter.effective_backend() == LimiterBackend::Redis
            && self.limiter.redis_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            bail!("limiter.backend is 'redis' but limiter.redis_url is not set");
        }

        if self.signing.secret.as_deref().is_none_or(str::is_empty) {
            warn!("signing.secret is not configured; playback URLs cannot be issued");
        }

        Ok(())
    }

    /// Base URL for capability URLs, `<base_url>/play` unless overridden
    pub fn stream_base_url(&self) -> String {
        match self.signing.stream_base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("{}/play", self.web.base_url_trimmed()),
        }
    }
}
