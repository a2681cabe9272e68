//! Initial migration creating the progress record and the chunk queue.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_sync_progress(manager).await?;
        self.create_scheduled_chunks(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledChunks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncProgress::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_sync_progress(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncProgress::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncProgress::Status)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    // Counters
                    .col(
                        ColumnDef::new(SyncProgress::ProcessedOrders)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncProgress::SkippedOrders)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncProgress::TotalOrders)
                            .big_integer()
                            .null(),
                    )
                    // Run ownership
                    .col(ColumnDef::new(SyncProgress::Cursor).text().null())
                    .col(ColumnDef::new(SyncProgress::RunToken).string().null())
                    // Timestamps
                    .col(
                        ColumnDef::new(SyncProgress::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncProgress::LastUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncProgress::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(SyncProgress::LastError).text().null())
                    .to_owned(),
            )
            .await
    }

    async fn create_scheduled_chunks(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledChunks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledChunks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduledChunks::RecordName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledChunks::RunToken).string().not_null())
                    .col(
                        ColumnDef::new(ScheduledChunks::DueAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledChunks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Workers poll by (record_name, due_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_chunks_due")
                    .table(ScheduledChunks::Table)
                    .col(ScheduledChunks::RecordName)
                    .col(ScheduledChunks::DueAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum SyncProgress {
    Table,
    Name,
    Status,
    ProcessedOrders,
    SkippedOrders,
    TotalOrders,
    Cursor,
    RunToken,
    StartedAt,
    LastUpdatedAt,
    LastSyncedAt,
    LastError,
}

#[derive(DeriveIden)]
enum ScheduledChunks {
    Table,
    Id,
    RecordName,
    RunToken,
    DueAt,
    CreatedAt,
}
