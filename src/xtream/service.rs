//! Xtream Codes compatibility shim
//!
//! The username field carries a gateway API token and the password is
//! ignored. Stream listings expose stable integer stream IDs; category IDs
//! are numbered per response and are only consistent within it.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

use super::models::*;
use crate::config::XtreamConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{CatalogEntry, Entitlement, Feature, PlaybackGrant, StreamQuality, Subscription};
use crate::services::admission::StreamSlots;
use crate::services::{
    CatalogService, CredentialService, EntitlementService, EpgWindow, PlaybackService,
};
use crate::utils::{SharedClock, log_prefix};

const UNCATEGORIZED: &str = "Uncategorized";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub struct XtreamService {
    credentials: CredentialService,
    entitlements: EntitlementService,
    catalog: CatalogService,
    playback: PlaybackService,
    slots: StreamSlots,
    config: XtreamConfig,
    base_url: url::Url,
    clock: SharedClock,
}

impl XtreamService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        credentials: CredentialService,
        entitlements: EntitlementService,
        catalog: CatalogService,
        playback: PlaybackService,
        slots: StreamSlots,
        config: XtreamConfig,
        base_url: url::Url,
        clock: SharedClock,
    ) -> Self {
        Self {
            credentials,
            entitlements,
            catalog,
            playback,
            slots,
            config,
            base_url,
            clock,
        }
    }

    pub fn stream_path_prefix(&self) -> &str {
        &self.config.stream_path_prefix
    }

    /// Check an xtream username as an API token
    pub async fn authenticate(&self, username: &str) -> AppResult<Subscription> {
        if !self.credentials.has_token_shape(username) {
            debug!("Xtream username does not carry the credential prefix");
            return Err(AppError::AuthInvalid);
        }
        self.credentials.authenticate(username).await
    }

    /// Answer an authenticated `player_api.php` call
    pub async fn respond(
        &self,
        subscription: &Subscription,
        request: &XtreamApiRequest,
    ) -> AppResult<Value> {
        let action = request.action.trim();
        if action.is_empty() {
            return to_json(self.login(subscription, request).await?);
        }

        let Ok(action) = XtreamAction::from_str(action) else {
            debug!(action = %action, "Unsupported xtream action");
            return Ok(Value::Array(Vec::new()));
        };

        match action {
            XtreamAction::GetLiveCategories => to_json(self.live_categories().await?),
            XtreamAction::GetLiveStreams => {
                let category = Some(request.category_id.trim()).filter(|c| !c.is_empty());
                to_json(self.live_streams(category).await?)
            }
            XtreamAction::GetShortEpg => {
                to_json(self.epg(subscription, request, false).await?)
            }
            XtreamAction::GetSimpleDataTable => {
                to_json(self.epg(subscription, request, true).await?)
            }
            XtreamAction::GetVodInfo | XtreamAction::GetSeriesInfo => {
                Ok(Value::Object(serde_json::Map::new()))
            }
            XtreamAction::GetVodCategories
            | XtreamAction::GetVodStreams
            | XtreamAction::GetSeriesCategories
            | XtreamAction::GetSeries => Ok(Value::Array(Vec::new())),
        }
    }

    async fn login(
        &self,
        subscription: &Subscription,
        request: &XtreamApiRequest,
    ) -> AppResult<XtreamLoginResponse> {
        let entitlement = self
            .entitlements
            .for_subscriber(&subscription.subscriber_id)
            .await?;
        let active = self.slots.active(&subscription.subscriber_id).await;
        let now = self.clock.now();

        info!(
            subscriber_id = %subscription.subscriber_id,
            token = %log_prefix(&request.username),
            "Xtream login"
        );

        let scheme = self.base_url.scheme().to_string();
        let port = self
            .base_url
            .port_or_known_default()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let (http_port, https_port) = if scheme == "https" {
            ("80".to_string(), port)
        } else {
            (port, "443".to_string())
        };

        Ok(XtreamLoginResponse {
            user_info: XtreamUserInfo {
                username: request.username.clone(),
                password: request.password.clone(),
                message: String::new(),
                auth: 1,
                status: "Active".to_string(),
                exp_date: subscription
                    .current_period_end
                    .map(|end| end.timestamp().to_string()),
                is_trial: "0".to_string(),
                active_cons: active.to_string(),
                created_at: None,
                max_connections: entitlement.max_concurrent_streams.to_string(),
                allowed_output_formats: vec!["m3u8".to_string(), "ts".to_string()],
            },
            server_info: XtreamServerInfo {
                url: self.base_url.host_str().unwrap_or_default().to_string(),
                port: http_port,
                https_port,
                server_protocol: scheme,
                rtmp_port: "0".to_string(),
                timezone: self.config.timezone.clone(),
                timestamp_now: now.timestamp(),
                time_now: now.format(TIME_FORMAT).to_string(),
            },
        })
    }

    pub async fn live_categories(&self) -> AppResult<Vec<XtreamCategory>> {
        let entries = self.catalog.entries().await?;
        Ok(category_ids(&entries)
            .into_iter()
            .map(|(name, id)| XtreamCategory {
                category_id: id.to_string(),
                category_name: name.to_string(),
                parent_id: 0,
            })
            .collect())
    }

    /// Active channels, optionally restricted to one per-response category ID
    pub async fn live_streams(&self, category_id: Option<&str>) -> AppResult<Vec<XtreamLiveStream>> {
        let entries = self.catalog.entries().await?;
        let categories = category_ids(&entries);

        Ok(entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let category = categories
                    .get(category_label(entry))
                    .copied()
                    .unwrap_or_default();
                if category_id.is_some_and(|wanted| wanted != category.to_string()) {
                    return None;
                }
                let channel = &entry.channel;
                Some(XtreamLiveStream {
                    num: index + 1,
                    name: channel.name.clone(),
                    stream_type: "live",
                    stream_id: entry.stream_id,
                    stream_icon: channel.logo_url.clone().unwrap_or_default(),
                    epg_channel_id: channel.tvg_id.clone(),
                    added: channel.created_at.timestamp().to_string(),
                    category_id: category.to_string(),
                    category_ids: vec![category],
                    custom_sid: String::new(),
                    tv_archive: 0,
                    direct_source: String::new(),
                    tv_archive_duration: 0,
                })
            })
            .collect())
    }

    async fn epg(
        &self,
        subscription: &Subscription,
        request: &XtreamApiRequest,
        full_table: bool,
    ) -> AppResult<XtreamEpgResponse> {
        let entitlement = self
            .entitlements
            .for_subscriber(&subscription.subscriber_id)
            .await?;
        if !entitlement.allows(Feature::Epg) {
            return Ok(XtreamEpgResponse::default());
        }

        let Ok(stream_id) = request.stream_id.trim().parse::<i32>() else {
            return Ok(XtreamEpgResponse::default());
        };
        let channel_id = match self.catalog.channel_id_for_stream(stream_id).await {
            Ok(id) => id,
            Err(AppError::NotFound { .. }) => return Ok(XtreamEpgResponse::default()),
            Err(e) => return Err(e),
        };

        let max_entries = request
            .limit
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|limit| *limit > 0)
            .map_or(self.config.epg_max_entries, |limit| {
                limit.min(self.config.epg_max_entries)
            });
        let window = EpgWindow {
            lookbehind: self.config.epg_lookbehind,
            lookahead: self.config.epg_lookahead,
            max_entries,
        };

        let epg_channel = match self.catalog.playable_channel(&channel_id).await {
            Ok(channel) => channel.tvg_id.unwrap_or_else(|| channel_id.clone()),
            Err(AppError::NotFound { .. } | AppError::ChannelUnavailable { .. }) => {
                channel_id.clone()
            }
            Err(e) => return Err(e),
        };
        let now = self.clock.now();

        let epg_listings = self
            .catalog
            .epg(&channel_id, window)
            .await?
            .into_iter()
            .map(|program| XtreamEpgListing {
                id: program.id,
                epg_id: epg_channel.clone(),
                title: STANDARD.encode(program.title.as_bytes()),
                lang: String::new(),
                start: format_time(program.start_time),
                end: format_time(program.end_time),
                description: STANDARD.encode(program.description.unwrap_or_default().as_bytes()),
                channel_id: epg_channel.clone(),
                start_timestamp: program.start_time.timestamp().to_string(),
                stop_timestamp: program.end_time.timestamp().to_string(),
                now_playing: full_table
                    .then(|| u8::from(program.start_time <= now && now < program.end_time)),
                has_archive: full_table.then_some(0),
            })
            .collect();

        Ok(XtreamEpgResponse { epg_listings })
    }

    /// Resolve `<stream_id>.<ext>` to a signed playback URL for an authenticated subscriber
    pub async fn stream_redirect(
        &self,
        subscription: &Subscription,
        stream_file: &str,
    ) -> AppResult<PlaybackGrant> {
        let raw_id = stream_file
            .split_once('.')
            .map_or(stream_file, |(id, _ext)| id);
        let stream_id = raw_id
            .parse::<i32>()
            .map_err(|_| AppError::not_found("stream", raw_id))?;

        let channel_id = self.catalog.channel_id_for_stream(stream_id).await?;
        let entitlement = self
            .entitlements
            .for_subscriber(&subscription.subscriber_id)
            .await?;

        self.playback
            .grant(
                &subscription.subscriber_id,
                &channel_id,
                best_quality(&entitlement),
            )
            .await
    }
}

/// Highest quality the plan allows; players cannot ask for one
fn best_quality(entitlement: &Entitlement) -> StreamQuality {
    [StreamQuality::Uhd, StreamQuality::Hd]
        .into_iter()
        .find(|q| q.required_feature().is_some_and(|f| entitlement.allows(f)))
        .unwrap_or_default()
}

fn category_label(entry: &CatalogEntry) -> &str {
    entry
        .channel
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
}

/// Number category labels alphabetically from 1
fn category_ids(entries: &[CatalogEntry]) -> BTreeMap<&str, u32> {
    let mut categories: BTreeMap<&str, u32> =
        entries.iter().map(|e| (category_label(e), 0)).collect();
    for (index, id) in categories.values_mut().enumerate() {
        *id = index as u32 + 1;
    }
    categories
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

fn to_json<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::internal(format!("Xtream serialization: {e}")))
}
