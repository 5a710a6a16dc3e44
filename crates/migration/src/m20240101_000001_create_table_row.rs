//! Create `table_row` table.
//!
//! Rows of every logical table, ordered by `(table_name, partition_key, row_key)`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TableRow::Table)
                    .if_not_exists()
                    .col(string_len(TableRow::TableName, 64).not_null())
                    .col(string_len(TableRow::PartitionKey, 256).not_null())
                    .col(string_len(TableRow::RowKey, 256).not_null())
                    .col(json_binary(TableRow::Properties).not_null())
                    .col(timestamp_with_time_zone(TableRow::Timestamp).not_null())
                    .col(string_len(TableRow::Etag, 64).not_null())
                    .primary_key(
                        Index::create()
                            .col(TableRow::TableName)
                            .col(TableRow::PartitionKey)
                            .col(TableRow::RowKey),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(TableRow::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub(crate) enum TableRow { Table, TableName, PartitionKey, RowKey, Properties, Timestamp, Etag }
