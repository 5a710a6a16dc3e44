//! Table storage for the hackathon platform.
//!
//! Entities are addressed by `(partition_key, row_key)` and persisted through
//! a [`table::TableStore`] backend: in memory or Postgres via sea-orm.

pub mod db;
pub mod entities;
pub mod errors;
pub mod query;
pub mod storage_utils;
pub mod table;
pub mod table_row;

pub use errors::ModelError;
pub use table::{MemoryTableStore, Page, SeaOrmTableStore, Table, TableEntity, TableRow, TableStore};
