//! SeaORM-based channel repository
//!
//! The gateway only reads the catalog in production; `create` and
//! `set_active` exist for seeding and tests.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, sea_query::Expr,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{channels, prelude::Channels};
use crate::models::Channel;

/// Request for channel creation
#[derive(Debug, Clone, Default)]
pub struct ChannelCreateRequest {
    pub id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub tvg_id: Option<String>,
    pub logo_url: Option<String>,
    pub channel_number: Option<i32>,
    pub origin_url: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct ChannelSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ChannelSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn create(
        &self,
        request: ChannelCreateRequest,
        now: DateTime<Utc>,
    ) -> Result<Channel, DbErr> {
        let active_model = channels::ActiveModel {
            id: Set(request.id.unwrap_or_else(|| Uuid::new_v4().to_string())),
            name: Set(request.name),
            category: Set(request.category),
            tvg_id: Set(request.tvg_id),
            logo_url: Set(request.logo_url),
            channel_number: Set(request.channel_number),
            origin_url: Set(request.origin_url),
            is_active: Set(request.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        Ok(Self::model_to_domain(model))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Channel>, DbErr> {
        let model = Channels::find_by_id(id.to_string())
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::model_to_domain))
    }

    /// Active channels in insertion order: `(created_at, id)`.
    ///
    /// This ordering is what stable stream IDs are derived from, so it must
    /// not depend on mutable attributes such as name or number.
    pub async fn find_active(&self) -> Result<Vec<Channel>, DbErr> {
        let models = Channels::find()
            .filter(channels::Column::IsActive.eq(true))
            .order_by_asc(channels::Column::CreatedAt)
            .order_by_asc(channels::Column::Id)
            .all(&*self.connection)
            .await?;

        Ok(models.into_iter().map(Self::model_to_domain).collect())
    }

    pub async fn set_active(
        &self,
        id: &str,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let result = Channels::update_many()
            .col_expr(channels::Column::IsActive, Expr::value(is_active))
            .col_expr(channels::Column::UpdatedAt, Expr::value(now))
            .filter(channels::Column::Id.eq(id))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    fn model_to_domain(model: channels::Model) -> Channel {
        Channel {
            id: model.id,
            name: model.name,
            category: model.category,
            tvg_id: model.tvg_id,
            logo_url: model.logo_url,
            channel_number: model.channel_number,
            origin_url: model.origin_url,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
