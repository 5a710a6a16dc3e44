//! Table storage abstraction.
//!
//! Every entity lives in a named table and is addressed by
//! `(partition_key, row_key)`. Rows are kept ordered by that key pair, which
//! is also the order of query results and the basis of continuation tokens.

pub mod memory;
pub mod seaorm;

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ModelError;
use crate::query::{format_datetime, Filter, PARTITION_KEY, ROW_KEY};

pub use memory::MemoryTableStore;
pub use seaorm::SeaOrmTableStore;

const TIMESTAMP: &str = "Timestamp";
const ETAG: &str = "Etag";

/// Raw stored row: keys, system columns and a bag of JSON properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub etag: String,
    pub properties: Map<String, Value>,
}

impl TableRow {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: Utc::now(),
            etag: String::new(),
            properties,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.partition_key.clone(), self.row_key.clone())
    }

    /// Property lookup used by filters; system columns resolve too.
    pub fn property(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            PARTITION_KEY => Some(Cow::Owned(Value::String(self.partition_key.clone()))),
            ROW_KEY => Some(Cow::Owned(Value::String(self.row_key.clone()))),
            TIMESTAMP => Some(Cow::Owned(Value::String(format_datetime(&self.timestamp)))),
            _ => self.properties.get(name).map(Cow::Borrowed),
        }
    }

    fn touch(&mut self) {
        self.timestamp = Utc::now();
        self.etag = format!("W/\"{}\"", uuid::Uuid::new_v4().simple());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Replace,
    Merge,
}

/// Resolve the row that a write produces given what is currently stored.
pub(crate) fn apply_write(existing: Option<TableRow>, mut row: TableRow, mode: WriteMode) -> TableRow {
    if let (WriteMode::Merge, Some(mut current)) = (mode, existing) {
        for (k, v) in std::mem::take(&mut row.properties) {
            current.properties.insert(k, v);
        }
        row.properties = current.properties;
    }
    row.touch();
    row
}

/// One segment of a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub values: Vec<T>,
    pub continuation_token: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self { Self { values: Vec::new(), continuation_token: None } }
}

/// Split a `"{pk} {rk}"` continuation token.
pub fn parse_continuation_token(token: &str) -> (String, String) {
    match token.split_once(' ') {
        Some((pk, rk)) => (pk.to_string(), rk.to_string()),
        None => (token.to_string(), String::new()),
    }
}

pub fn continuation_token_for(row: &TableRow) -> String {
    format!("{} {}", row.partition_key, row.row_key)
}

/// Take one segment from rows already ordered and positioned at the token.
pub(crate) fn segment<'a>(
    rows: impl Iterator<Item = &'a TableRow>,
    filter: Option<&Filter>,
    top: Option<usize>,
) -> Page<TableRow> {
    let mut matching = rows.filter(|r| filter.map_or(true, |f| f.matches(r)));
    let Some(top) = top else {
        return Page { values: matching.cloned().collect(), continuation_token: None };
    };
    let values: Vec<TableRow> = matching.by_ref().take(top).cloned().collect();
    let continuation_token = matching.next().map(continuation_token_for);
    Page { values, continuation_token }
}

/// Backend-agnostic row store.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fails with `Conflict` when the key is taken.
    async fn insert(&self, table: &str, row: TableRow) -> Result<TableRow, ModelError>;
    /// Writes whether or not the key exists.
    async fn upsert(&self, table: &str, row: TableRow, mode: WriteMode) -> Result<TableRow, ModelError>;
    /// Fails with `NotFound` when the key is missing.
    async fn update(&self, table: &str, row: TableRow, mode: WriteMode) -> Result<TableRow, ModelError>;
    async fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Option<TableRow>, ModelError>;
    async fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> Result<(), ModelError>;
    async fn query(
        &self,
        table: &str,
        filter: Option<&Filter>,
        continuation_token: Option<&str>,
        top: Option<usize>,
    ) -> Result<Page<TableRow>, ModelError>;
}

/// Entities persisted through a [`TableStore`].
///
/// Implementors serialize with PascalCase property names and carry the
/// `PartitionKey`, `RowKey`, `Timestamp` and `Etag` system fields.
pub trait TableEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE_NAME: &'static str;

    fn partition_key(&self) -> &str;
    fn row_key(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    /// Last write time, set once the entity has been read back from a store.
    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn etag(&self) -> Option<&str>;

    fn to_row(&self) -> Result<TableRow, ModelError> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(ModelError::Serialization(format!("{} must serialize to an object", Self::TABLE_NAME))),
        };
        for k in [PARTITION_KEY, ROW_KEY, TIMESTAMP, ETAG] {
            map.remove(k);
        }
        map.retain(|_, v| !v.is_null());
        Ok(TableRow {
            partition_key: self.partition_key().to_string(),
            row_key: self.row_key().to_string(),
            timestamp: Utc::now(),
            etag: String::new(),
            properties: map,
        })
    }

    fn from_row(row: TableRow) -> Result<Self, ModelError> {
        let mut map = row.properties;
        map.insert(PARTITION_KEY.into(), Value::String(row.partition_key));
        map.insert(ROW_KEY.into(), Value::String(row.row_key));
        map.insert(TIMESTAMP.into(), Value::String(format_datetime(&row.timestamp)));
        map.insert(ETAG.into(), Value::String(row.etag));
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

/// Implements [`TableEntity`] for a struct carrying the system fields
/// `partition_key`, `row_key`, `created_at`, `timestamp` and `etag`.
#[macro_export]
macro_rules! table_entity {
    ($ty:ty, $table:expr) => {
        impl $crate::table::TableEntity for $ty {
            const TABLE_NAME: &'static str = $table;
            fn partition_key(&self) -> &str { &self.partition_key }
            fn row_key(&self) -> &str { &self.row_key }
            fn created_at(&self) -> chrono::DateTime<chrono::Utc> { self.created_at }
            fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> { self.timestamp }
            fn etag(&self) -> Option<&str> { self.etag.as_deref() }
        }
    };
}

/// Typed view over one table of a [`TableStore`].
pub struct Table<E> {
    store: Arc<dyn TableStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Table<E> {
    fn clone(&self) -> Self { Self { store: Arc::clone(&self.store), _entity: PhantomData } }
}

impl<E: TableEntity> Table<E> {
    pub fn new(store: Arc<dyn TableStore>) -> Self { Self { store, _entity: PhantomData } }

    pub fn name(&self) -> &'static str { E::TABLE_NAME }

    pub async fn insert(&self, entity: &E) -> Result<E, ModelError> {
        let row = self.store.insert(E::TABLE_NAME, entity.to_row()?).await?;
        E::from_row(row)
    }

    pub async fn insert_or_replace(&self, entity: &E) -> Result<E, ModelError> {
        let row = self.store.upsert(E::TABLE_NAME, entity.to_row()?, WriteMode::Replace).await?;
        E::from_row(row)
    }

    pub async fn insert_or_merge(&self, entity: &E) -> Result<E, ModelError> {
        let row = self.store.upsert(E::TABLE_NAME, entity.to_row()?, WriteMode::Merge).await?;
        E::from_row(row)
    }

    pub async fn merge(&self, entity: &E) -> Result<E, ModelError> {
        let row = self.store.update(E::TABLE_NAME, entity.to_row()?, WriteMode::Merge).await?;
        E::from_row(row)
    }

    pub async fn replace(&self, entity: &E) -> Result<E, ModelError> {
        let row = self.store.update(E::TABLE_NAME, entity.to_row()?, WriteMode::Replace).await?;
        E::from_row(row)
    }

    pub async fn retrieve(&self, partition_key: &str, row_key: &str) -> Result<Option<E>, ModelError> {
        match self.store.retrieve(E::TABLE_NAME, partition_key, row_key).await? {
            Some(row) => Ok(Some(E::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Load, mutate and merge back. Returns `None` when the row is missing.
    pub async fn retrieve_and_merge<F>(&self, partition_key: &str, row_key: &str, f: F) -> Result<Option<E>, ModelError>
    where
        F: FnOnce(&mut E) + Send,
    {
        let Some(mut entity) = self.retrieve(partition_key, row_key).await? else {
            return Ok(None);
        };
        f(&mut entity);
        self.merge(&entity).await.map(Some)
    }

    pub async fn delete(&self, partition_key: &str, row_key: &str) -> Result<(), ModelError> {
        self.store.delete(E::TABLE_NAME, partition_key, row_key).await
    }

    pub async fn query_segmented(
        &self,
        filter: Option<&Filter>,
        continuation_token: Option<&str>,
        top: Option<usize>,
    ) -> Result<Page<E>, ModelError> {
        let page = self.store.query(E::TABLE_NAME, filter, continuation_token, top).await?;
        let values = page.values.into_iter().map(E::from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page { values, continuation_token: page.continuation_token })
    }

    /// All matching entities across segments.
    pub async fn query_entities(&self, filter: Option<&Filter>) -> Result<Vec<E>, ModelError> {
        let page = self.query_segmented(filter, None, None).await?;
        Ok(page.values)
    }

    /// Run `f` for every matching entity, in key order.
    pub async fn execute_query<F, Fut>(&self, filter: Option<&Filter>, mut f: F) -> Result<(), ModelError>
    where
        F: FnMut(E) -> Fut + Send,
        Fut: Future<Output = Result<(), ModelError>> + Send,
    {
        let mut token: Option<String> = None;
        loop {
            let page = self.query_segmented(filter, token.as_deref(), Some(1000)).await?;
            for entity in page.values {
                f(entity).await?;
            }
            match page.continuation_token {
                Some(t) => token = Some(t),
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Sample {
        partition_key: String,
        row_key: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
        #[serde(default)]
        etag: Option<String>,
        #[serde(default)]
        created_at: DateTime<Utc>,
        title: Option<String>,
        count: i32,
    }
    table_entity!(Sample, "Sample");

    #[test]
    fn entity_round_trips_through_row() -> anyhow::Result<()> {
        let s = Sample { partition_key: "p".into(), row_key: "r".into(), title: None, count: 3, ..Default::default() };
        let row = s.to_row()?;
        assert_eq!(row.partition_key, "p");
        assert!(!row.properties.contains_key("Title"));
        assert!(!row.properties.contains_key("PartitionKey"));
        assert_eq!(row.properties.get("Count"), Some(&json!(3)));
        let back = Sample::from_row(row)?;
        assert_eq!(back.count, 3);
        assert!(back.timestamp().is_some());
        assert_eq!(back.etag(), Some(""));
        Ok(())
    }

    #[test]
    fn merge_keeps_untouched_properties() {
        let existing = TableRow::new("p", "r", json!({"A": 1, "B": 2}));
        let update = TableRow::new("p", "r", json!({"B": 3}));
        let merged = apply_write(Some(existing.clone()), update.clone(), WriteMode::Merge);
        assert_eq!(merged.properties.get("A"), Some(&json!(1)));
        assert_eq!(merged.properties.get("B"), Some(&json!(3)));
        let replaced = apply_write(Some(existing), update, WriteMode::Replace);
        assert!(replaced.properties.get("A").is_none());
        assert!(!replaced.etag.is_empty());
    }

    #[test]
    fn parses_continuation_tokens() {
        assert_eq!(parse_continuation_token("pk rk"), ("pk".to_string(), "rk".to_string()));
        assert_eq!(parse_continuation_token("pk "), ("pk".to_string(), String::new()));
        assert_eq!(parse_continuation_token("pk"), ("pk".to_string(), String::new()));
    }
}
