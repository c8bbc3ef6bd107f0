//! Per-UUID fetch family (`spec.md` §4.6 "Per-UUID fetch family"):
//! flow-records, messages, and object-logs all resolve their SELECT by
//! fetching the by-UUID column family for each distinct UUID the WHERE
//! stage surfaced, then projecting the requested columns.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use query_types::{DbDataValue, RowHandle};
use snafu::{ResultExt, Snafu};
use storage_engine::{RowKey, StorageEngine, StorageError};

#[derive(Debug, Snafu)]
pub enum FetchError {
    #[snafu(display("per-uuid fetch of {cf} failed: {source}"))]
    Storage { cf: String, source: StorageError },
}

/// Every SandeshType an object-log row can carry
/// (`spec.md` §4.6 "Object-log SELECT is split").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandeshType {
    System,
    Object,
    Uve,
    Alarm,
    Other,
}

impl SandeshType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "SYSTEM" => Self::System,
            "OBJECT" => Self::Object,
            "UVE" => Self::Uve,
            "ALARM" => Self::Alarm,
            _ => Self::Other,
        }
    }

    /// The output field this row routes to, or `None` if dropped
    /// entirely.
    pub fn routed_field(self) -> Option<&'static str> {
        match self {
            Self::System => Some("SYSTEM_LOG"),
            Self::Object | Self::Uve | Self::Alarm => Some("OBJECT_LOG"),
            Self::Other => None,
        }
    }
}

/// Distinct UUIDs present in a WHERE result, in first-seen order.
pub fn distinct_uuids(rows: &[RowHandle]) -> Vec<DbDataValue> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for row in rows {
        if let Some(uuid) = row.uuid_cell() {
            if seen.insert(uuid.clone()) {
                out.push(uuid.clone());
            }
        }
    }
    out
}

/// Fetches and projects one UUID's row from `cf_name`. An empty
/// `select_fields` projects every column the engine returns.
pub async fn fetch_by_uuid(
    engine: &dyn StorageEngine,
    cf_name: &str,
    uuid: &DbDataValue,
    select_fields: &[String],
) -> Result<BTreeMap<String, DbDataValue>, FetchError> {
    let row_key = RowKey::new(vec![uuid.clone()]);
    let cells = engine.get_row(cf_name, &row_key).await.context(StorageSnafu { cf: cf_name.to_string() })?;

    let mut out = BTreeMap::new();
    for cell in cells {
        let name = cell.name.to_display_string();
        if select_fields.is_empty() || select_fields.iter().any(|f| f == &name) {
            if let Some(v) = cell.values.into_iter().next() {
                out.insert(name, v);
            }
        }
    }
    Ok(out)
}

/// Fetches every distinct UUID's row and routes object-log rows by
/// `SandeshType`, dropping any row whose type is not one of the three
/// documented routes.
pub async fn fetch_object_log_rows(
    engine: Arc<dyn StorageEngine>,
    cf_name: &str,
    uuids: &[DbDataValue],
    select_fields: &[String],
) -> Result<Vec<(&'static str, BTreeMap<String, DbDataValue>)>, FetchError> {
    let mut out = Vec::new();
    for uuid in uuids {
        let row = fetch_by_uuid(engine.as_ref(), cf_name, uuid, select_fields).await?;
        let sandesh = row
            .get("SandeshType")
            .map(|v| SandeshType::from_str(&v.to_display_string()))
            .unwrap_or(SandeshType::Other);
        if let Some(field) = sandesh.routed_field() {
            out.push((field, row));
        }
    }
    Ok(out)
}

/// Fetches and projects every distinct UUID's row from a plain by-UUID
/// family (messages, flow-records).
pub async fn fetch_rows(
    engine: Arc<dyn StorageEngine>,
    cf_name: &str,
    uuids: &[DbDataValue],
    select_fields: &[String],
) -> Result<Vec<BTreeMap<String, DbDataValue>>, FetchError> {
    let mut out = Vec::with_capacity(uuids.len());
    for uuid in uuids {
        out.push(fetch_by_uuid(engine.as_ref(), cf_name, uuid, select_fields).await?);
    }
    Ok(out)
}
