use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_sessions_table(manager).await?;
        self.create_api_tokens_table(manager).await?;
        self.create_subscriptions_table(manager).await?;
        self.create_channels_table(manager).await?;
        self.create_channel_stream_ids_table(manager).await?;
        self.create_epg_programs_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EpgPrograms::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChannelStreamIds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Channels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    async fn create_sessions_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::TokenHash)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::SubscriberId).string().not_null())
                    .col(ColumnDef::new(Sessions::DeviceId).string().not_null())
                    .col(ColumnDef::new(Sessions::Platform).string().not_null())
                    .col(ColumnDef::new(Sessions::ClientVersion).string().not_null())
                    .col(self.create_timestamp_column(manager, Sessions::IssuedAt))
                    .col(self.create_timestamp_column(manager, Sessions::ExpiresAt))
                    .col(self.create_timestamp_column(manager, Sessions::LastUsedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_api_tokens_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApiTokens::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApiTokens::SubscriberId).string().not_null())
                    .col(
                        ColumnDef::new(ApiTokens::TokenHash)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ApiTokens::Label).string())
                    .col(self.create_timestamp_column(manager, ApiTokens::CreatedAt))
                    .col(self.create_nullable_timestamp_column(manager, ApiTokens::RevokedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_subscriptions_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscriptions::SubscriberId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subscriptions::PlanSlug).string().not_null())
                    .col(
                        ColumnDef::new(Subscriptions::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(self.create_nullable_timestamp_column(
                        manager,
                        Subscriptions::CurrentPeriodEnd,
                    ))
                    .col(self.create_timestamp_column(manager, Subscriptions::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Channels::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Channels::Name).string().not_null())
                    .col(ColumnDef::new(Channels::Category).string())
                    .col(ColumnDef::new(Channels::TvgId).string())
                    .col(ColumnDef::new(Channels::LogoUrl).string())
                    .col(ColumnDef::new(Channels::ChannelNumber).integer())
                    .col(ColumnDef::new(Channels::OriginUrl).string().not_null())
                    .col(
                        ColumnDef::new(Channels::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.create_timestamp_column(manager, Channels::CreatedAt))
                    .col(self.create_timestamp_column(manager, Channels::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_channel_stream_ids_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChannelStreamIds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChannelStreamIds::StreamId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ChannelStreamIds::ChannelId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(self.create_timestamp_column(manager, ChannelStreamIds::AssignedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_epg_programs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgPrograms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EpgPrograms::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EpgPrograms::ChannelId).string().not_null())
                    .col(ColumnDef::new(EpgPrograms::Title).string().not_null())
                    .col(ColumnDef::new(EpgPrograms::Description).string())
                    .col(self.create_timestamp_column(manager, EpgPrograms::StartTime))
                    .col(self.create_timestamp_column(manager, EpgPrograms::EndTime))
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // Sweeper scans by expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_expires_at")
                    .table(Sessions::Table)
                    .col(Sessions::ExpiresAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_subscriber_id")
                    .table(Sessions::Table)
                    .col(Sessions::SubscriberId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_api_tokens_subscriber_id")
                    .table(ApiTokens::Table)
                    .col(ApiTokens::SubscriberId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_channels_is_active")
                    .table(Channels::Table)
                    .col(Channels::IsActive)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_epg_programs_channel_time")
                    .table(EpgPrograms::Table)
                    .col(EpgPrograms::ChannelId)
                    .col(EpgPrograms::StartTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    TokenHash,
    SubscriberId,
    DeviceId,
    Platform,
    ClientVersion,
    IssuedAt,
    ExpiresAt,
    LastUsedAt,
}

#[derive(DeriveIden)]
enum ApiTokens {
    Table,
    Id,
    SubscriberId,
    TokenHash,
    Label,
    CreatedAt,
    RevokedAt,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    SubscriberId,
    PlanSlug,
    Status,
    CurrentPeriodEnd,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Channels {
    Table,
    Id,
    Name,
    Category,
    TvgId,
    LogoUrl,
    ChannelNumber,
    OriginUrl,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ChannelStreamIds {
    Table,
    StreamId,
    ChannelId,
    AssignedAt,
}

#[derive(DeriveIden)]
enum EpgPrograms {
    Table,
    Id,
    ChannelId,
    Title,
    Description,
    StartTime,
    EndTime,
}
