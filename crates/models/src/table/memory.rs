use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{apply_write, parse_continuation_token, segment, Page, TableRow, TableStore, WriteMode};
use crate::errors::ModelError;
use crate::query::Filter;

type Rows = BTreeMap<(String, String), TableRow>;

/// Process-local table store. Each table is an ordered map.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: DashMap<String, Rows>,
}

impl MemoryTableStore {
    pub fn new() -> Self { Self::default() }

    /// Number of rows in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn insert(&self, table: &str, row: TableRow) -> Result<TableRow, ModelError> {
        let mut rows = self.tables.entry(table.to_string()).or_default();
        let key = row.key();
        if rows.contains_key(&key) {
            return Err(ModelError::conflict(table, &key.0, &key.1));
        }
        let stored = apply_write(None, row, WriteMode::Replace);
        rows.insert(key, stored.clone());
        Ok(stored)
    }

    async fn upsert(&self, table: &str, row: TableRow, mode: WriteMode) -> Result<TableRow, ModelError> {
        let mut rows = self.tables.entry(table.to_string()).or_default();
        let key = row.key();
        let stored = apply_write(rows.remove(&key), row, mode);
        rows.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update(&self, table: &str, row: TableRow, mode: WriteMode) -> Result<TableRow, ModelError> {
        let mut rows = self.tables.entry(table.to_string()).or_default();
        let key = row.key();
        let Some(existing) = rows.remove(&key) else {
            return Err(ModelError::not_found(table, &key.0, &key.1));
        };
        let stored = apply_write(Some(existing), row, mode);
        rows.insert(key, stored.clone());
        Ok(stored)
    }

    async fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Option<TableRow>, ModelError> {
        Ok(self
            .tables
            .get(table)
            .and_then(|rows| rows.get(&(partition_key.to_string(), row_key.to_string())).cloned()))
    }

    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<(), ModelError> {
        if let Some(mut rows) = self.tables.get_mut(table) {
            rows.remove(&(partition_key.to_string(), row_key.to_string()));
        }
        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        filter: Option<&Filter>,
        continuation_token: Option<&str>,
        top: Option<usize>,
    ) -> Result<Page<TableRow>, ModelError> {
        let Some(rows) = self.tables.get(table) else {
            return Ok(Page::default());
        };
        let start = continuation_token.map(parse_continuation_token).unwrap_or_default();
        let pinned = filter.and_then(|f| f.partition_key());
        let candidates = rows
            .range(start..)
            .map(|(_, row)| row)
            .skip_while(|row| pinned.is_some_and(|pk| row.partition_key.as_str() < pk))
            .take_while(|row| pinned.map_or(true, |pk| row.partition_key == pk));
        Ok(segment(candidates, filter, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{filter_for_int, partition_key_filter, ComparisonOperator};
    use serde_json::json;

    async fn seeded() -> anyhow::Result<MemoryTableStore> {
        let store = MemoryTableStore::new();
        for (pk, rk, n) in [("b", "2", 2), ("a", "1", 1), ("b", "1", 3), ("c", "1", 4), ("a", "2", 5)] {
            store.insert("T", TableRow::new(pk, rk, json!({ "N": n }))).await?;
        }
        Ok(store)
    }

    #[tokio::test]
    async fn insert_conflicts_on_existing_key() -> anyhow::Result<()> {
        let store = seeded().await?;
        let err = store.insert("T", TableRow::new("a", "1", json!({}))).await.unwrap_err();
        assert!(matches!(err, ModelError::Conflict(_)));
        Ok(())
    }

    #[tokio::test]
    async fn update_requires_existing_row() -> anyhow::Result<()> {
        let store = seeded().await?;
        let err = store.update("T", TableRow::new("z", "1", json!({})), WriteMode::Merge).await.unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
        let merged = store.update("T", TableRow::new("a", "1", json!({"M": true})), WriteMode::Merge).await?;
        assert_eq!(merged.properties.get("N"), Some(&json!(1)));
        assert_eq!(merged.properties.get("M"), Some(&json!(true)));
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> anyhow::Result<()> {
        let store = seeded().await?;
        store.delete("T", "a", "1").await?;
        store.delete("T", "a", "1").await?;
        store.delete("Missing", "a", "1").await?;
        assert!(store.retrieve("T", "a", "1").await?.is_none());
        assert_eq!(store.len("T"), 4);
        Ok(())
    }

    #[tokio::test]
    async fn query_pages_in_key_order() -> anyhow::Result<()> {
        let store = seeded().await?;
        let first = store.query("T", None, None, Some(2)).await?;
        let keys: Vec<_> = first.values.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec![("a".into(), "1".into()), ("a".into(), "2".into())]);
        assert_eq!(first.continuation_token.as_deref(), Some("b 1"));

        let rest = store.query("T", None, first.continuation_token.as_deref(), Some(10)).await?;
        assert_eq!(rest.values.len(), 3);
        assert!(rest.continuation_token.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn query_applies_filters() -> anyhow::Result<()> {
        let store = seeded().await?;
        let page = store.query("T", Some(&partition_key_filter("b")), None, None).await?;
        assert_eq!(page.values.len(), 2);

        let f = filter_for_int("N", ComparisonOperator::GreaterThan, 2);
        let page = store.query("T", Some(&f), None, Some(1)).await?;
        assert_eq!(page.values[0].key(), ("a".to_string(), "2".to_string()));
        assert_eq!(page.continuation_token.as_deref(), Some("b 1"));
        Ok(())
    }
}
