//! Converts a `query_types::RowHandle` into the shape each SELECT family
//! needs (`spec.md` §3, §4.6).
//!
//! `RowHandle`'s own doc comment allows a family-dependent cell-vector
//! shape ("or carries a pre-extracted payload"); flow-series and stats
//! row handles carry their attribute payload as a flat interleaved
//! `[name, value, name, value, ...]` sequence, the convention this module
//! decodes. Per-UUID families never reach this module — they resolve
//! their SELECT by a direct `select_exec::fetch` call against the
//! matched UUIDs, not by reading the WHERE row-handle's cells.

use std::collections::BTreeMap;

use query_types::{DbDataValue, RowHandle};
use select_exec::{FlowSample, FsOutputRow};
use serde_json::Value as Json;

/// Decodes a flow-series/stats row-handle's flat interleaved cells into
/// an attribute map.
pub fn row_attrs(row: &RowHandle) -> BTreeMap<String, DbDataValue> {
    let mut out = BTreeMap::new();
    let mut cells = row.cells.iter();
    while let (Some(name), Some(value)) = (cells.next(), cells.next()) {
        out.insert(name.to_display_string(), value.clone());
    }
    out
}

/// Projects one flow-series row-handle into a [`FlowSample`], pulling
/// `tuple_fields` from the decoded attribute map in SELECT order and
/// defaulting missing `packets`/`bytes` counters to zero.
pub fn row_to_flow_sample(row: &RowHandle, tuple_fields: &[String]) -> FlowSample {
    let attrs = row_attrs(row);
    let tuple = tuple_fields.iter().filter_map(|f| attrs.get(f).map(|v| (f.clone(), v.clone()))).collect();
    let packets = attrs.get("packets").and_then(DbDataValue::as_u64).unwrap_or(0);
    let bytes = attrs.get("bytes").and_then(DbDataValue::as_u64).unwrap_or(0);
    FlowSample { t: row.timestamp, tuple, packets, bytes }
}

/// Converts a fetched, already-projected column map into the string-keyed
/// row shape `postproc`'s filter/sort operate on.
pub fn to_string_row(row: &BTreeMap<String, DbDataValue>) -> hashbrown::HashMap<String, String> {
    row.iter().map(|(k, v)| (k.clone(), v.to_display_string())).collect()
}

/// Renders one flow-series output row into the generic JSON row shape
/// written to the result bus, naming stats columns after the SELECT
/// tokens that produce them (`spec.md` §4.6).
pub fn render_fs_row(row: &FsOutputRow) -> BTreeMap<String, Json> {
    let mut out = BTreeMap::new();
    if let Some(t) = row.t {
        out.insert("T".to_string(), Json::from(t));
    }
    for (name, value) in &row.tuple {
        out.insert(name.clone(), value.to_json());
    }
    if let Some(stats) = row.stats {
        out.insert("sum(packets)".to_string(), Json::from(stats.sum_packets));
        out.insert("sum(bytes)".to_string(), Json::from(stats.sum_bytes));
        out.insert("flow_count".to_string(), Json::from(stats.flow_count));
    }
    if let Some(class_id) = row.flow_class_id {
        out.insert("flow_class_id".to_string(), Json::from(class_id));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interleaved_row(ts: u64, pairs: &[(&str, DbDataValue)]) -> RowHandle {
        let mut cells = Vec::new();
        for (name, value) in pairs {
            cells.push(DbDataValue::String(name.to_string()));
            cells.push(value.clone());
        }
        RowHandle::new(ts, cells)
    }

    #[test]
    fn row_attrs_decodes_interleaved_pairs() {
        let row = interleaved_row(100, &[("svn", DbDataValue::U64(1)), ("packets", DbDataValue::U64(5))]);
        let attrs = row_attrs(&row);
        assert_eq!(attrs.get("svn"), Some(&DbDataValue::U64(1)));
        assert_eq!(attrs.get("packets"), Some(&DbDataValue::U64(5)));
    }

    #[test]
    fn row_to_flow_sample_projects_tuple_and_counters() {
        let row = interleaved_row(
            200,
            &[("svn", DbDataValue::U64(7)), ("dvn", DbDataValue::U64(8)), ("packets", DbDataValue::U64(3)), ("bytes", DbDataValue::U64(150))],
        );
        let sample = row_to_flow_sample(&row, &["svn".to_string(), "dvn".to_string()]);
        assert_eq!(sample.t, 200);
        assert_eq!(sample.packets, 3);
        assert_eq!(sample.bytes, 150);
        assert_eq!(sample.tuple, vec![("svn".to_string(), DbDataValue::U64(7)), ("dvn".to_string(), DbDataValue::U64(8))]);
    }

    #[test]
    fn missing_counters_default_to_zero() {
        let row = interleaved_row(1, &[("svn", DbDataValue::U64(1))]);
        let sample = row_to_flow_sample(&row, &[]);
        assert_eq!(sample.packets, 0);
        assert_eq!(sample.bytes, 0);
    }

    #[test]
    fn render_fs_row_names_stats_columns_after_select_tokens() {
        let row = FsOutputRow {
            t: Some(100),
            tuple: vec![("svn".to_string(), DbDataValue::U64(3))],
            stats: Some(select_exec::FlowStats { sum_packets: 5, sum_bytes: 500, flow_count: 2 }),
            flow_class_id: Some(42),
        };
        let rendered = render_fs_row(&row);
        assert_eq!(rendered.get("T"), Some(&Json::from(100)));
        assert_eq!(rendered.get("svn"), Some(&Json::from(3)));
        assert_eq!(rendered.get("sum(packets)"), Some(&Json::from(5)));
        assert_eq!(rendered.get("flow_class_id"), Some(&Json::from(42)));
    }
}
