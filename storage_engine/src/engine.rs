//! The async storage-engine contract (`spec.md` §6 "Storage engine
//! contract"). `where_exec` drives `get_row_async` from inside a
//! `work_pipeline` sub-pipeline; `coordinator` drives the synchronous-
//! shaped `get_row` once per query admission to read `QUERY:<qid>`.

use async_trait::async_trait;
use schema::ColumnNameRange;

use crate::error::StorageError;
use crate::types::{ColumnCell, Consistency, RowKey};

/// A column-family-addressed, range-scanning storage backend.
#[async_trait]
pub trait StorageEngine: std::fmt::Debug + Send + Sync {
    /// Selects the keyspace this engine instance serves.
    fn set_tablespace(&self, name: &str);

    /// Declares a column family the engine should be prepared to scan.
    /// A no-op for backends with no schema registration step; kept on
    /// the trait because the source's engine required it before the
    /// first scan of a CF.
    fn use_columnfamily(&self, cf: &str);

    /// Range-scans one row's columns in `[column_range.start,
    /// column_range.finish)`, optionally using a secondary index hint
    /// (`where_index_vec`). Returns the matching column cells in
    /// ascending column-name order.
    async fn get_row_async(
        &self,
        cf: &str,
        row_key: &RowKey,
        column_range: &ColumnNameRange,
        where_index_vec: &[usize],
        consistency: Consistency,
    ) -> Result<Vec<ColumnCell>, StorageError>;

    /// Reads an entire row's columns as a flat hash, used once per query
    /// at admission to fetch `QUERY:<qid>` (`spec.md` §4.3).
    async fn get_row(&self, cf: &str, row_key: &RowKey) -> Result<Vec<ColumnCell>, StorageError>;

    /// Reads several rows at once, used by object-value summaries
    /// (`spec.md` §6).
    async fn get_multirow(&self, cf: &str, row_keys: &[RowKey]) -> Result<Vec<Vec<ColumnCell>>, StorageError> {
        let mut rows = Vec::with_capacity(row_keys.len());
        for key in row_keys {
            rows.push(self.get_row(cf, key).await?);
        }
        Ok(rows)
    }
}
