//! Stable integer stream IDs for the xtream protocol
//!
//! IDs come from an autoincrement column and are never reassigned, so a
//! channel keeps its number across restarts and unrelated catalog writes.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::entities::{channel_stream_ids, prelude::ChannelStreamIds};

#[derive(Clone)]
pub struct StreamIdSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl StreamIdSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// All assignments as `channel_id -> stream_id`
    pub async fn find_all(&self) -> Result<HashMap<String, i32>, DbErr> {
        let models = ChannelStreamIds::find().all(&*self.connection).await?;
        Ok(models
            .into_iter()
            .map(|m| (m.channel_id, m.stream_id))
            .collect())
    }

    pub async fn find_channel_id(&self, stream_id: i32) -> Result<Option<String>, DbErr> {
        let model = ChannelStreamIds::find_by_id(stream_id)
            .one(&*self.connection)
            .await?;
        Ok(model.map(|m| m.channel_id))
    }

    pub async fn find_stream_id(&self, channel_id: &str) -> Result<Option<i32>, DbErr> {
        let model = ChannelStreamIds::find()
            .filter(channel_stream_ids::Column::ChannelId.eq(channel_id))
            .one(&*self.connection)
            .await?;
        Ok(model.map(|m| m.stream_id))
    }

    /// Assign IDs to channels that have none, in the order given.
    ///
    /// Concurrent callers racing on the same channel are resolved by the
    /// unique constraint; the loser's row is silently skipped.
    pub async fn assign_missing(
        &self,
        ordered_channel_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        if ordered_channel_ids.is_empty() {
            return Ok(0);
        }

        let rows = ordered_channel_ids
            .iter()
            .map(|channel_id| channel_stream_ids::ActiveModel {
                channel_id: Set(channel_id.clone()),
                assigned_at: Set(at),
                ..Default::default()
            });

        let inserted = ChannelStreamIds::insert_many(rows)
            .on_conflict(
                OnConflict::column(channel_stream_ids::Column::ChannelId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.connection)
            .await?;

        debug!(
            "Assigned stream ids to {} of {} channels",
            inserted,
            ordered_channel_ids.len()
        );
        Ok(inserted)
    }
}
