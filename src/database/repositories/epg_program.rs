//! SeaORM-based EPG program repository

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;

use crate::entities::{epg_programs, prelude::EpgPrograms};
use crate::models::EpgProgram;

#[derive(Clone)]
pub struct EpgProgramSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl EpgProgramSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn create(&self, program: &EpgProgram) -> Result<(), DbErr> {
        let active_model = epg_programs::ActiveModel {
            id: Set(program.id.clone()),
            channel_id: Set(program.channel_id.clone()),
            title: Set(program.title.clone()),
            description: Set(program.description.clone()),
            start_time: Set(program.start_time),
            end_time: Set(program.end_time),
        };
        active_model.insert(&*self.connection).await?;
        Ok(())
    }

    /// Programs on a channel overlapping `[start_time, end_time)`, earliest first, at most `limit`
    pub async fn find_window(
        &self,
        channel_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<EpgProgram>, DbErr> {
        let models = EpgPrograms::find()
            .filter(epg_programs::Column::ChannelId.eq(channel_id))
            .filter(epg_programs::Column::EndTime.gt(start_time))
            .filter(epg_programs::Column::StartTime.lt(end_time))
            .order_by_asc(epg_programs::Column::StartTime)
            .limit(limit)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    fn model_to_domain(model: epg_programs::Model) -> EpgProgram {
        EpgProgram {
            id: model.id,
            channel_id: model.channel_id,
            title: model.title,
            description: model.description,
            start_time: model.start_time,
            end_time: model.end_time,
        }
    }
}
