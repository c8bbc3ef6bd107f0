//! Object-value summary read path (`SPEC_FULL.md` §4.9): a `get_multirow`
//! fan-out against an object-value table's by-UUID column family for a
//! fixed set of keys, used by the front-end's object dashboard rather
//! than by a regular chunked query.

use std::collections::BTreeMap;
use std::sync::Arc;

use query_types::DbDataValue;
use snafu::{ResultExt, Snafu};
use storage_engine::{RowKey, StorageEngine, StorageError};

#[derive(Debug, Snafu)]
pub enum SummarizeError {
    #[snafu(display("object summary fetch of {cf} failed: {source}"))]
    Storage { cf: String, source: StorageError },
}

/// Fetches and projects every `row_keys` row from `cf_name`, keeping one
/// output row per key in the order requested. An empty `select_fields`
/// projects every column the engine returns.
pub async fn summarize(
    engine: Arc<dyn StorageEngine>,
    cf_name: &str,
    row_keys: &[DbDataValue],
    select_fields: &[String],
) -> Result<Vec<BTreeMap<String, DbDataValue>>, SummarizeError> {
    let keys: Vec<RowKey> = row_keys.iter().map(|k| RowKey::new(vec![k.clone()])).collect();
    let rows = engine.get_multirow(cf_name, &keys).await.context(StorageSnafu { cf: cf_name.to_string() })?;

    Ok(rows
        .into_iter()
        .map(|cells| {
            let mut out = BTreeMap::new();
            for cell in cells {
                let name = cell.name.to_display_string();
                if select_fields.is_empty() || select_fields.iter().any(|f| f == &name) {
                    if let Some(v) = cell.values.into_iter().next() {
                        out.insert(name, v);
                    }
                }
            }
            out
        })
        .collect())
}
