//! Stable integer identifiers exposed through the xtream protocol.
//!
//! Rows are append-only: once a channel has a `stream_id` it keeps it.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channel_stream_ids")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub stream_id: i32,
    #[sea_orm(unique)]
    pub channel_id: String,
    pub assigned_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
