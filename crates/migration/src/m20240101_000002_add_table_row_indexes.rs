//! Secondary indexes for `table_row`.
use sea_orm_migration::prelude::*;

use crate::m20240101_000001_create_table_row::TableRow;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_table_row_timestamp")
                    .table(TableRow::Table)
                    .col(TableRow::TableName)
                    .col(TableRow::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_table_row_timestamp").table(TableRow::Table).to_owned())
            .await
    }
}
