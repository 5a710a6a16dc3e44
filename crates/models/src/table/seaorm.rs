use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::Value;

use super::{apply_write, parse_continuation_token, segment, Page, TableRow, TableStore, WriteMode};
use crate::errors::ModelError;
use crate::query::Filter;
use crate::table_row::{self, Column, Entity};

const QUERY_BATCH: u64 = 500;

/// Table store over the Postgres `table_row` table.
#[derive(Clone)]
pub struct SeaOrmTableStore {
    db: DatabaseConnection,
}

impl SeaOrmTableStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }

    pub fn connection(&self) -> &DatabaseConnection { &self.db }
}

fn to_model(table: &str, row: &TableRow) -> table_row::Model {
    table_row::Model {
        table_name: table.to_string(),
        partition_key: row.partition_key.clone(),
        row_key: row.row_key.clone(),
        properties: Value::Object(row.properties.clone()),
        timestamp: row.timestamp.into(),
        etag: row.etag.clone(),
    }
}

fn from_model(m: table_row::Model) -> TableRow {
    let properties = match m.properties {
        Value::Object(map) => map,
        _ => Default::default(),
    };
    TableRow {
        partition_key: m.partition_key,
        row_key: m.row_key,
        timestamp: m.timestamp.with_timezone(&Utc),
        etag: m.etag,
        properties,
    }
}

fn key(table: &str, pk: &str, rk: &str) -> (String, String, String) {
    (table.to_string(), pk.to_string(), rk.to_string())
}

impl SeaOrmTableStore {
    async fn write(&self, table: &str, row: TableRow, mode: WriteMode, must_exist: bool) -> Result<TableRow, ModelError> {
        let txn = self.db.begin().await?;
        let existing = Entity::find_by_id(key(table, &row.partition_key, &row.row_key)).one(&txn).await?;
        if must_exist && existing.is_none() {
            return Err(ModelError::not_found(table, &row.partition_key, &row.row_key));
        }
        let was_stored = existing.is_some();
        let stored = apply_write(existing.map(from_model), row, mode);
        let model = to_model(table, &stored);
        if was_stored {
            let mut am = model.clone().into_active_model();
            am.properties = Set(model.properties);
            am.timestamp = Set(model.timestamp);
            am.etag = Set(model.etag);
            am.update(&txn).await?;
        } else {
            model.into_active_model().insert(&txn).await?;
        }
        txn.commit().await?;
        Ok(stored)
    }
}

#[async_trait]
impl TableStore for SeaOrmTableStore {
    async fn insert(&self, table: &str, row: TableRow) -> Result<TableRow, ModelError> {
        if Entity::find_by_id(key(table, &row.partition_key, &row.row_key)).one(&self.db).await?.is_some() {
            return Err(ModelError::conflict(table, &row.partition_key, &row.row_key));
        }
        let stored = apply_write(None, row, WriteMode::Replace);
        to_model(table, &stored).into_active_model().insert(&self.db).await?;
        Ok(stored)
    }

    async fn upsert(&self, table: &str, row: TableRow, mode: WriteMode) -> Result<TableRow, ModelError> {
        self.write(table, row, mode, false).await
    }

    async fn update(&self, table: &str, row: TableRow, mode: WriteMode) -> Result<TableRow, ModelError> {
        self.write(table, row, mode, true).await
    }

    async fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Option<TableRow>, ModelError> {
        let found = Entity::find_by_id(key(table, partition_key, row_key)).one(&self.db).await?;
        Ok(found.map(from_model))
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<(), ModelError> {
        Entity::delete_by_id(key(table, partition_key, row_key)).exec(&self.db).await?;
        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        filter: Option<&Filter>,
        continuation_token: Option<&str>,
        top: Option<usize>,
    ) -> Result<Page<TableRow>, ModelError> {
        let mut select = Entity::find().filter(Column::TableName.eq(table));
        if let Some(pk) = filter.and_then(|f| f.partition_key()) {
            select = select.filter(Column::PartitionKey.eq(pk));
        }
        if let Some((np, nr)) = continuation_token.map(parse_continuation_token) {
            select = select.filter(
                Condition::any()
                    .add(Column::PartitionKey.gt(np.clone()))
                    .add(Condition::all().add(Column::PartitionKey.eq(np)).add(Column::RowKey.gte(nr))),
            );
        }
        let select = select.order_by_asc(Column::PartitionKey).order_by_asc(Column::RowKey);

        // Fetch in batches until one row past `top` has matched.
        let wanted = top.map(|t| t + 1);
        let mut matched = Vec::new();
        let mut pages = select.paginate(&self.db, QUERY_BATCH);
        while let Some(batch) = pages.fetch_and_next().await? {
            matched.extend(
                batch.into_iter().map(from_model).filter(|r| filter.map_or(true, |f| f.matches(r))),
            );
            if wanted.is_some_and(|w| matched.len() >= w) {
                break;
            }
        }
        Ok(segment(matched.iter(), None, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use migration::MigratorTrait;
    use serde_json::json;

    async fn store() -> Option<SeaOrmTableStore> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return None;
        }
        let db = match db::connect().await {
            Ok(db) => db,
            Err(e) => {
                eprintln!("skip: cannot connect to db: {}", e);
                return None;
            }
        };
        if let Err(e) = migration::Migrator::up(&db, None).await {
            eprintln!("skip: migrate up failed: {}", e);
            return None;
        }
        Some(SeaOrmTableStore::new(db))
    }

    #[tokio::test]
    async fn crud_and_query_against_postgres() -> anyhow::Result<()> {
        let Some(store) = store().await else { return Ok(()) };
        let table = format!("Test{}", uuid::Uuid::new_v4().simple());

        store.insert(&table, TableRow::new("p", "1", json!({"A": 1}))).await?;
        store.insert(&table, TableRow::new("p", "2", json!({"A": 2}))).await?;
        assert!(matches!(
            store.insert(&table, TableRow::new("p", "1", json!({}))).await,
            Err(ModelError::Conflict(_))
        ));

        let merged = store.upsert(&table, TableRow::new("p", "1", json!({"B": true})), WriteMode::Merge).await?;
        assert_eq!(merged.properties.get("A"), Some(&json!(1)));

        let page = store.query(&table, None, None, Some(1)).await?;
        assert_eq!(page.values.len(), 1);
        assert_eq!(page.continuation_token.as_deref(), Some("p 2"));

        store.delete(&table, "p", "1").await?;
        store.delete(&table, "p", "2").await?;
        assert!(store.retrieve(&table, "p", "1").await?.is_none());
        Ok(())
    }
}
