/// Configuration default values
///
/// All defaults live here so operators can see the shipped behavior in one place.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./gateway.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Session defaults
pub const DEFAULT_SESSION_TTL: &str = "4h";
pub const DEFAULT_SWEEP_INTERVAL: &str = "15m";
pub const DEFAULT_SWEEP_GRACE: &str = "1h";
pub const DEFAULT_TOUCH_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_TOUCH_TIMEOUT: &str = "5s";

// Admission limiter defaults
pub const DEFAULT_API_REQUESTS_PER_WINDOW: u32 = 100;
pub const DEFAULT_API_WINDOW: &str = "60s";
pub const DEFAULT_WINDOW_MARGIN: &str = "5s";
pub const DEFAULT_SLOT_TTL: &str = "35m";
pub const DEFAULT_LIMITER_OPERATION_TIMEOUT: &str = "100ms";

// Capability signing defaults
pub const DEFAULT_CAPABILITY_TTL: &str = "30m";

// Legacy protocol defaults
pub const DEFAULT_CREDENTIAL_PREFIX: &str = "gw_";
pub const DEFAULT_STREAM_PATH_PREFIX: &str = "live";
pub const DEFAULT_XTREAM_TIMEZONE: &str = "UTC";
pub const DEFAULT_EPG_LOOKBEHIND: &str = "4h";
pub const DEFAULT_EPG_LOOKAHEAD: &str = "48h";
pub const DEFAULT_EPG_MAX_ENTRIES: u64 = 100;

// Entitlement cache defaults
pub const DEFAULT_ENTITLEMENT_CACHE_TTL: &str = "60s";
pub const DEFAULT_ENTITLEMENT_CACHE_CAPACITY: usize = 10_000;

/// Environment variable prefix for overrides, e.g. `GATEWAY_SIGNING__SECRET`
pub const ENV_PREFIX: &str = "GATEWAY_";

pub(crate) fn parse_default(value: &str) -> std::time::Duration {
    humantime::parse_duration(value).unwrap_or_default()
}
