//! SeaORM-based session repository. Rows are keyed by the SHA-256 of the token.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use std::sync::Arc;

use crate::entities::{prelude::Sessions, sessions};
use crate::models::Session;

#[derive(Clone)]
pub struct SessionSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl SessionSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn insert(&self, token_hash: &str, session: &Session) -> Result<(), DbErr> {
        let active_model = sessions::ActiveModel {
            token_hash: Set(token_hash.to_string()),
            subscriber_id: Set(session.subscriber_id.clone()),
            device_id: Set(session.device_id.clone()),
            platform: Set(session.platform.clone()),
            client_version: Set(session.client_version.clone()),
            issued_at: Set(session.issued_at),
            expires_at: Set(session.expires_at),
            last_used_at: Set(session.last_used_at),
        };

        active_model.insert(&*self.connection).await?;
        Ok(())
    }

    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<Session>, DbErr> {
        let model = Sessions::find_by_id(token_hash.to_string())
            .one(&*self.connection)
            .await?;

        Ok(model.map(Self::model_to_domain))
    }

    /// Record a use of the session. Missing rows are not an error.
    pub async fn touch(&self, token_hash: &str, at: DateTime<Utc>) -> Result<u64, DbErr> {
        let result = Sessions::update_many()
            .col_expr(sessions::Column::LastUsedAt, Expr::value(at))
            .filter(sessions::Column::TokenHash.eq(token_hash))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn delete(&self, token_hash: &str) -> Result<bool, DbErr> {
        let result = Sessions::delete_by_id(token_hash.to_string())
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Delete every session that expired before `cutoff`
    pub async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbErr> {
        let result = Sessions::delete_many()
            .filter(sessions::Column::ExpiresAt.lt(cutoff))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected)
    }

    fn model_to_domain(model: sessions::Model) -> Session {
        Session {
            subscriber_id: model.subscriber_id,
            device_id: model.device_id,
            platform: model.platform,
            client_version: model.client_version,
            issued_at: model.issued_at,
            expires_at: model.expires_at,
            last_used_at: model.last_used_at,
        }
    }
}
