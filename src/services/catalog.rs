//! Read access to the channel catalog
//!
//! Also owns the stable integer stream IDs: every listing first assigns IDs
//! to channels that lack one, in `(created_at, id)` order, so the numbering
//! does not depend on how the catalog happens to be enumerated.

use chrono::Duration as ChronoDuration;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::debug;

use crate::database::repositories::{
    ChannelSeaOrmRepository, EpgProgramSeaOrmRepository, StreamIdSeaOrmRepository,
};
use crate::errors::{AppError, AppResult};
use crate::models::{CatalogEntry, Channel, EpgProgram};
use crate::utils::SharedClock;

/// Bounds for EPG lookups
#[derive(Debug, Clone, Copy)]
pub struct EpgWindow {
    pub lookbehind: Duration,
    pub lookahead: Duration,
    pub max_entries: u64,
}

#[derive(Clone)]
pub struct CatalogService {
    channels: ChannelSeaOrmRepository,
    stream_ids: StreamIdSeaOrmRepository,
    programs: EpgProgramSeaOrmRepository,
    clock: SharedClock,
}

impl CatalogService {
    pub fn new(
        channels: ChannelSeaOrmRepository,
        stream_ids: StreamIdSeaOrmRepository,
        programs: EpgProgramSeaOrmRepository,
        clock: SharedClock,
    ) -> Self {
        Self {
            channels,
            stream_ids,
            programs,
            clock,
        }
    }

    /// Active channels with their stable stream IDs, in display order
    pub async fn entries(&self) -> AppResult<Vec<CatalogEntry>> {
        let channels = self.channels.find_active().await?;
        let mut assigned = self.stream_ids.find_all().await?;

        let missing: Vec<String> = channels
            .iter()
            .filter(|c| !assigned.contains_key(&c.id))
            .map(|c| c.id.clone())
            .collect();
        if !missing.is_empty() {
            self.stream_ids
                .assign_missing(&missing, self.clock.now())
                .await?;
            assigned = self.stream_ids.find_all().await?;
        }

        let mut entries: Vec<CatalogEntry> = channels
            .into_iter()
            .filter_map(|channel| {
                let stream_id = assigned.get(&channel.id).copied();
                if stream_id.is_none() {
                    debug!(channel_id = %channel.id, "Channel has no stream id after assignment");
                }
                stream_id.map(|stream_id| CatalogEntry { stream_id, channel })
            })
            .collect();

        entries.sort_by(|a, b| display_order(&a.channel, &b.channel));
        Ok(entries)
    }

    /// Active channels in display order
    pub async fn channels(&self) -> AppResult<Vec<Channel>> {
        Ok(self.entries().await?.into_iter().map(|e| e.channel).collect())
    }

    /// A playable channel. Unknown IDs are `NotFound`, inactive ones `ChannelUnavailable`.
    pub async fn playable_channel(&self, channel_id: &str) -> AppResult<Channel> {
        let channel = self
            .channels
            .find_by_id(channel_id)
            .await?
            .ok_or_else(|| AppError::not_found("channel", channel_id))?;

        if !channel.is_active {
            return Err(AppError::ChannelUnavailable {
                id: channel_id.to_string(),
            });
        }
        Ok(channel)
    }

    pub async fn channel_id_for_stream(&self, stream_id: i32) -> AppResult<String> {
        self.stream_ids
            .find_channel_id(stream_id)
            .await?
            .ok_or_else(|| AppError::not_found("stream", stream_id.to_string()))
    }

    /// Programs around now, bounded in time and count
    pub async fn epg(&self, channel_id: &str, window: EpgWindow) -> AppResult<Vec<EpgProgram>> {
        let now = self.clock.now();
        let behind = ChronoDuration::from_std(window.lookbehind).unwrap_or(ChronoDuration::zero());
        let ahead = ChronoDuration::from_std(window.lookahead).unwrap_or(ChronoDuration::zero());

        Ok(self
            .programs
            .find_window(channel_id, now - behind, now + ahead, window.max_entries)
            .await?)
    }
}

/// Numbered channels first by number, then the rest by name
fn display_order(a: &Channel, b: &Channel) -> Ordering {
    match (a.channel_number, b.channel_number) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    .then_with(|| a.id.cmp(&b.id))
}
