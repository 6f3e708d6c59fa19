//! SeaORM migrations for the gateway schema
//!
//! Timestamps are `TIMESTAMPTZ` on PostgreSQL and RFC 3339 text elsewhere.

use sea_orm_migration::prelude::*;

pub mod m20261001_000001_initial_schema;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20261001_000001_initial_schema::Migration)]
    }
}
