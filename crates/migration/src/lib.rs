//! Migrator for the generic table storage.
//! Every entity shares the `table_row` table keyed by table name and row keys.
pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_table_row;
mod m20240101_000002_add_table_row_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_table_row::Migration),
            // Indexes should always be applied last
            Box::new(m20240101_000002_add_table_row_indexes::Migration),
        ]
    }
}
