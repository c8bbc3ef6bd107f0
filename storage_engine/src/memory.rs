//! In-memory reference `StorageEngine`, used by tests and by `qed` when
//! no networked backend is configured.

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use query_types::DbDataValue;
use schema::ColumnNameRange;

use crate::engine::StorageEngine;
use crate::error::{RowNotFoundSnafu, StorageError};
use crate::types::{ColumnCell, Consistency, RowKey};
use snafu::OptionExt;

type Row = Vec<ColumnCell>;

#[derive(Debug, Default)]
pub struct InMemoryEngine {
    // cf name -> row key -> sorted columns
    tables: RwLock<HashMap<String, HashMap<RowKey, Row>>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one row. Columns are stored sorted by name so range scans
    /// can binary-partition them.
    pub fn put_row(&self, cf: &str, row_key: RowKey, mut columns: Row) {
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        self.tables
            .write()
            .entry(cf.to_string())
            .or_default()
            .insert(row_key, columns);
    }

    fn in_range(name: &DbDataValue, range: &ColumnNameRange) -> bool {
        name >= &range.start && name < &range.finish
    }
}

#[async_trait]
impl StorageEngine for InMemoryEngine {
    fn set_tablespace(&self, _name: &str) {}

    fn use_columnfamily(&self, cf: &str) {
        self.tables.write().entry(cf.to_string()).or_default();
    }

    async fn get_row_async(
        &self,
        cf: &str,
        row_key: &RowKey,
        column_range: &ColumnNameRange,
        _where_index_vec: &[usize],
        _consistency: Consistency,
    ) -> Result<Vec<ColumnCell>, StorageError> {
        let tables = self.tables.read();
        let row = tables
            .get(cf)
            .and_then(|t| t.get(row_key))
            .cloned()
            .unwrap_or_default();
        Ok(row
            .into_iter()
            .filter(|c| Self::in_range(&c.name, column_range))
            .take(column_range.count.map(|c| c as usize).unwrap_or(usize::MAX))
            .collect())
    }

    async fn get_row(&self, cf: &str, row_key: &RowKey) -> Result<Vec<ColumnCell>, StorageError> {
        let tables = self.tables.read();
        tables
            .get(cf)
            .and_then(|t| t.get(row_key))
            .cloned()
            .context(RowNotFoundSnafu { cf: cf.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(name: &str, value: &str) -> ColumnCell {
        ColumnCell { name: DbDataValue::String(name.to_string()), values: vec![DbDataValue::String(value.to_string())] }
    }

    #[tokio::test]
    async fn range_scan_returns_only_matching_columns() {
        let engine = InMemoryEngine::new();
        let key = RowKey::new(vec![DbDataValue::U64(1)]);
        engine.put_row("cf1", key.clone(), vec![cell("a", "1"), cell("b", "2"), cell("z", "9")]);

        let range = ColumnNameRange::new(DbDataValue::String("a".into()), DbDataValue::String("c".into()));
        let result = engine.get_row_async("cf1", &key, &range, &[], Consistency::One).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, DbDataValue::String("a".into()));
    }

    #[tokio::test]
    async fn missing_row_returns_not_found_for_get_row() {
        let engine = InMemoryEngine::new();
        let key = RowKey::new(vec![DbDataValue::U64(1)]);
        let err = engine.get_row("cf1", &key).await.unwrap_err();
        assert!(matches!(err, StorageError::RowNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_row_in_async_scan_yields_empty_not_error() {
        let engine = InMemoryEngine::new();
        let key = RowKey::new(vec![DbDataValue::U64(1)]);
        let range = ColumnNameRange::new(DbDataValue::String("a".into()), DbDataValue::String("z".into()));
        let result = engine.get_row_async("cf1", &key, &range, &[], Consistency::One).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn get_multirow_fetches_each_key() {
        let engine = InMemoryEngine::new();
        let k1 = RowKey::new(vec![DbDataValue::U64(1)]);
        let k2 = RowKey::new(vec![DbDataValue::U64(2)]);
        engine.put_row("cf1", k1.clone(), vec![cell("a", "1")]);
        engine.put_row("cf1", k2.clone(), vec![cell("a", "2")]);
        let rows = engine.get_multirow("cf1", &[k1, k2]).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
