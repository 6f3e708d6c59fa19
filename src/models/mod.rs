use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// A validated client session as stored (minus the token, which is never persisted)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub subscriber_id: String,
    pub device_id: String,
    pub platform: String,
    pub client_version: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Device metadata supplied when exchanging an API token for a session
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeviceInfo {
    pub device_id: String,
    pub platform: String,
    pub client_version: String,
}

/// Result of a successful session issuance. `token` is shown to the client exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Read-only view of a subscriber's billing state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub subscriber_id: String,
    pub plan_slug: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Subscription {
    pub const ACTIVE_STATUS: &'static str = "active";

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status.eq_ignore_ascii_case(Self::ACTIVE_STATUS)
            && self.current_period_end.is_none_or(|end| end > now)
    }
}

/// Capabilities a plan may grant
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Feature {
    Live,
    Epg,
    Hd,
    Uhd,
}

/// What a plan allows. Cached by value, owned by the billing side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Entitlement {
    pub plan_slug: String,
    pub max_concurrent_streams: u32,
    pub features: Vec<Feature>,
}

impl Entitlement {
    pub fn allows(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// Requested playback quality
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StreamQuality {
    #[default]
    Sd,
    Hd,
    Uhd,
}

impl StreamQuality {
    /// Plan feature needed to request this quality, if any
    pub fn required_feature(self) -> Option<Feature> {
        match self {
            StreamQuality::Sd => None,
            StreamQuality::Hd => Some(Feature::Hd),
            StreamQuality::Uhd => Some(Feature::Uhd),
        }
    }
}

/// Catalog channel. The origin URL stays on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub tvg_id: Option<String>,
    pub logo_url: Option<String>,
    pub channel_number: Option<i32>,
    #[serde(skip_serializing, default)]
    #[schema(ignore)]
    pub origin_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A channel paired with its stable integer identifier
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub stream_id: i32,
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct EpgProgram {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A signed, time-boxed playback URL
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlaybackGrant {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub quality: StreamQuality,
}
