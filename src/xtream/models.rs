//! Wire types for the Xtream Codes player API
//!
//! Field names and the string-typed numbers are what players expect; most
//! clients deserialize these leniently but some break on JSON numbers.

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Query parameters of `player_api.php`. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct XtreamApiRequest {
    pub username: String,
    pub password: String,
    pub action: String,
    pub category_id: String,
    pub stream_id: String,
    pub limit: String,
}

/// Actions the gateway understands. Anything else answers with an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum XtreamAction {
    GetLiveCategories,
    GetLiveStreams,
    GetShortEpg,
    GetSimpleDataTable,
    GetVodCategories,
    GetVodStreams,
    GetVodInfo,
    GetSeriesCategories,
    GetSeries,
    GetSeriesInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct XtreamLoginResponse {
    pub user_info: XtreamUserInfo,
    pub server_info: XtreamServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct XtreamUserInfo {
    pub username: String,
    pub password: String,
    pub message: String,
    pub auth: u8,
    pub status: String,
    pub exp_date: Option<String>,
    pub is_trial: String,
    pub active_cons: String,
    pub created_at: Option<String>,
    pub max_connections: String,
    pub allowed_output_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct XtreamServerInfo {
    pub url: String,
    pub port: String,
    pub https_port: String,
    pub server_protocol: String,
    pub rtmp_port: String,
    pub timezone: String,
    pub timestamp_now: i64,
    pub time_now: String,
}

/// Body for rejected credentials, always sent with HTTP 200
#[derive(Debug, Clone, Serialize)]
pub struct XtreamAuthFailure {
    pub user_info: XtreamAuthFailureInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct XtreamAuthFailureInfo {
    pub auth: u8,
}

impl XtreamAuthFailure {
    pub fn new() -> Self {
        Self {
            user_info: XtreamAuthFailureInfo { auth: 0 },
        }
    }
}

impl Default for XtreamAuthFailure {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XtreamCategory {
    pub category_id: String,
    pub category_name: String,
    pub parent_id: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct XtreamLiveStream {
    pub num: usize,
    pub name: String,
    pub stream_type: &'static str,
    pub stream_id: i32,
    pub stream_icon: String,
    pub epg_channel_id: Option<String>,
    pub added: String,
    pub category_id: String,
    pub category_ids: Vec<u32>,
    pub custom_sid: String,
    pub tv_archive: u8,
    pub direct_source: String,
    pub tv_archive_duration: u32,
}

/// One EPG row. Title and description are base64 encoded.
#[derive(Debug, Clone, Serialize)]
pub struct XtreamEpgListing {
    pub id: String,
    pub epg_id: String,
    pub title: String,
    pub lang: String,
    pub start: String,
    pub end: String,
    pub description: String,
    pub channel_id: String,
    pub start_timestamp: String,
    pub stop_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now_playing: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_archive: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct XtreamEpgResponse {
    pub epg_listings: Vec<XtreamEpgListing>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn actions_parse_from_wire_names() {
        assert_eq!(
            XtreamAction::from_str("get_live_streams").unwrap(),
            XtreamAction::GetLiveStreams
        );
        assert_eq!(
            XtreamAction::from_str("get_simple_data_table").unwrap(),
            XtreamAction::GetSimpleDataTable
        );
        assert!(XtreamAction::from_str("get_everything").is_err());
    }

    #[test]
    fn auth_failure_shape() {
        let body = serde_json::to_value(XtreamAuthFailure::new()).unwrap();
        assert_eq!(body, serde_json::json!({ "user_info": { "auth": 0 } }));
    }
}
