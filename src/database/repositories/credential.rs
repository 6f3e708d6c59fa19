//! Long-lived API credentials and the subscription rows they resolve to

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    sea_query::OnConflict,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{
    api_tokens, prelude::{ApiTokens, Subscriptions}, subscriptions,
};
use crate::models::Subscription;

#[derive(Clone)]
pub struct CredentialSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl CredentialSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Subscriber owning a non-revoked token with this hash
    pub async fn find_unrevoked_subscriber(&self, token_hash: &str) -> Result<Option<String>, DbErr> {
        let model = ApiTokens::find()
            .filter(api_tokens::Column::TokenHash.eq(token_hash))
            .filter(api_tokens::Column::RevokedAt.is_null())
            .one(&*self.connection)
            .await?;

        Ok(model.map(|m| m.subscriber_id))
    }

    pub async fn find_subscription(&self, subscriber_id: &str) -> Result<Option<Subscription>, DbErr> {
        let model = Subscriptions::find_by_id(subscriber_id.to_string())
            .one(&*self.connection)
            .await?;

        Ok(model.map(|m| Subscription {
            subscriber_id: m.subscriber_id,
            plan_slug: m.plan_slug,
            status: m.status,
            current_period_end: m.current_period_end,
        }))
    }

    /// Register an already-hashed API token for a subscriber
    pub async fn create_token(
        &self,
        subscriber_id: &str,
        token_hash: &str,
        label: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<String, DbErr> {
        let id = Uuid::new_v4().to_string();
        let active_model = api_tokens::ActiveModel {
            id: Set(id.clone()),
            subscriber_id: Set(subscriber_id.to_string()),
            token_hash: Set(token_hash.to_string()),
            label: Set(label),
            created_at: Set(created_at),
            revoked_at: Set(None),
        };
        active_model.insert(&*self.connection).await?;
        Ok(id)
    }

    pub async fn revoke_token(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, DbErr> {
        let result = ApiTokens::update_many()
            .col_expr(
                api_tokens::Column::RevokedAt,
                sea_orm::sea_query::Expr::value(Some(at)),
            )
            .filter(api_tokens::Column::TokenHash.eq(token_hash))
            .filter(api_tokens::Column::RevokedAt.is_null())
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Insert or replace the subscription projection for a subscriber
    pub async fn upsert_subscription(
        &self,
        subscription: &Subscription,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        let active_model = subscriptions::ActiveModel {
            subscriber_id: Set(subscription.subscriber_id.clone()),
            plan_slug: Set(subscription.plan_slug.clone()),
            status: Set(subscription.status.clone()),
            current_period_end: Set(subscription.current_period_end),
            updated_at: Set(updated_at),
        };

        Subscriptions::insert(active_model)
            .on_conflict(
                OnConflict::column(subscriptions::Column::SubscriberId)
                    .update_columns([
                        subscriptions::Column::PlanSlug,
                        subscriptions::Column::Status,
                        subscriptions::Column::CurrentPeriodEnd,
                        subscriptions::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.connection)
            .await?;
        Ok(())
    }
}
