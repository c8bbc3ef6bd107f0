//! The query (`Q`): a query's JSON parameters parsed, TTL-clamped, and
//! chunk-planned (`spec.md` §3 "Query (Q)", §4.4).

use observability_deps::tracing::debug;
use predicate::{FilterTerm, WhereTree};
use postproc::{SortDirection, SortField};
use qe_time::Time;
use query_types::{compute_chunk_size, plan_chunks, Chunk, Direction, QueryError};
use schema::TableFamily;
use serde_json::Value as Json;

use crate::columns::column_datatype;
use crate::select::SelectPlan;
use crate::{select, where_clause};

/// Tunables the embedding binary supplies (`spec.md` §6 "CLI / environment":
/// `max_tasks` / `max_slice`), needed to plan a query's chunks.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Target number of stage-0 instances to spread a parallelizable
    /// query's chunks across.
    pub parallel_batches: u64,
    pub max_slice: u64,
}

/// A fully parsed, TTL-clamped, chunk-planned query (`spec.md` §3).
/// Immutable once constructed; `coordinator` owns admission/completion
/// around it.
#[derive(Debug, Clone)]
pub struct Q {
    pub qid: String,
    pub table: TableFamily,
    /// Time range as requested in the query JSON, before TTL clamping.
    pub requested_t_from: u64,
    pub requested_t_to: u64,
    /// Time range actually executed, after TTL clamping.
    pub t_from: u64,
    pub t_to: u64,
    pub where_tree: WhereTree,
    pub select: SelectPlan,
    pub sort_fields: Vec<SortField>,
    pub filter: Vec<Vec<FilterTerm>>,
    pub limit: Option<usize>,
    pub granularity: Option<u64>,
    pub dir: Direction,
    pub object_id: Option<String>,
    pub chunks: Vec<Chunk>,
    pub parallelizable: bool,
    pub merge_needed: bool,
}

impl Q {
    /// Whether this query's SELECT yields an aggregated multimap rather
    /// than a flat row list (`spec.md` §4.3).
    pub fn is_map_output(&self) -> bool {
        self.select.is_map_output()
    }
}

fn field_as_str<'a>(json: &'a Json, field: &str) -> Option<&'a str> {
    json.get(field).and_then(Json::as_str)
}

fn parse_string_array(json: &Json, field: &str) -> Vec<String> {
    json.get(field)
        .and_then(Json::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Finds the bare granularity, if any, carried by the SELECT (`T=<secs>`
/// among the flow-series/stats token set).
fn granularity_from_select(plan: &SelectPlan) -> Option<u64> {
    match plan {
        SelectPlan::FlowSeries { time_dim: select_exec::TimeDim::Binned(g), .. } => Some(*g),
        SelectPlan::Stats { tokens } => tokens.iter().find_map(|t| match t {
            select_exec::StatToken::Unique(name) if name.starts_with("T=") => {
                name.strip_prefix("T=").and_then(|s| s.parse::<u64>().ok()).map(|secs| secs * 1_000_000)
            }
            _ => None,
        }),
        _ => None,
    }
}

/// Whether a flow-series SELECT shape is one of the stats-bearing ones,
/// which, per `spec.md` §4.4, force `merge_needed = true` regardless of
/// table family.
fn flow_series_has_stats(plan: &SelectPlan) -> bool {
    use select_exec::FsShape::*;
    matches!(
        plan,
        SelectPlan::FlowSeries { shape: StatsOnly | TimeStats | TupleStats | TupleTimeStats, .. }
    )
}

fn object_id_value(tree: &WhereTree) -> Option<String> {
    tree.iter()
        .flat_map(|and_group| and_group.iter())
        .find(|t| t.name == "object_id" || t.name == "ObjectId")
        .map(|t| t.value.to_display_string())
}

/// Parses one query's JSON parameters into a [`Q`], per `spec.md` §6's
/// schema: clamps the requested time range to the table's TTL, classifies
/// the SELECT, validates WHERE, and plans chunks.
pub fn parse_query(qid: &str, json: &Json, now: Time, config: ParserConfig) -> Result<Q, QueryError> {
    let table_name = field_as_str(json, "table").unwrap_or("");
    let table = TableFamily::from_table_name(table_name);

    let start_time = field_as_str(json, "start_time")
        .ok_or_else(|| QueryError::BadMessage { qid: qid.to_string(), detail: "missing start_time".to_string() })?;
    let end_time = field_as_str(json, "end_time")
        .ok_or_else(|| QueryError::BadMessage { qid: qid.to_string(), detail: "missing end_time".to_string() })?;
    let requested_t_from = qe_time::parse_time_string(start_time, now)
        .map_err(|e| QueryError::BadMessage { qid: qid.to_string(), detail: e.to_string() })?
        .micros();
    let requested_t_to = qe_time::parse_time_string(end_time, now)
        .map_err(|e| QueryError::BadMessage { qid: qid.to_string(), detail: e.to_string() })?
        .micros();

    let ttl_micros = table.ttl_bucket().default_duration().as_micros() as u64;
    let earliest_allowed = now.micros().saturating_sub(ttl_micros);
    let mut t_from = requested_t_from.max(earliest_allowed);
    let t_to = requested_t_to.min(now.micros());
    if t_from > t_to {
        debug!(qid, t_from, t_to, "TTL clamp collapsed the range, falling back to a 1us window");
        t_from = t_to.saturating_sub(1);
    }

    let select_fields = parse_string_array(json, "select_fields");
    let select = select::parse_select(qid, table, &select_fields)?;

    let where_json = json.get("where").cloned().unwrap_or(Json::Null);
    let where_tree = where_clause::parse_and_validate_where(qid, table, &where_json)?;

    let filter_json = json.get("filter").cloned().unwrap_or(Json::Null);
    let filter = where_clause::parse_filter(qid, &filter_json)?;

    let direction = if json.get("sort").and_then(Json::as_u64) == Some(2) { SortDirection::Descending } else { SortDirection::Ascending };
    let sort_fields = parse_string_array(json, "sort_fields")
        .into_iter()
        .map(|name| {
            let datatype = column_datatype(&name);
            SortField::new(name, datatype, direction)
        })
        .collect();

    let limit = json.get("limit").and_then(Json::as_u64).map(|v| v as usize);
    let dir = Direction::from_bit(json.get("dir").and_then(Json::as_u64).unwrap_or(0) as u8);
    let granularity = granularity_from_select(&select);
    let object_id = object_id_value(&where_tree);

    let parallelizable = table.is_parallelizable();
    let chunks = if parallelizable {
        let chunk_size = compute_chunk_size(t_from, t_to, config.parallel_batches, config.max_slice, granularity);
        plan_chunks(t_from, t_to, chunk_size)
    } else {
        vec![Chunk { index: 0, t_start: t_from, t_end: t_to }]
    };

    let merge_needed = table.always_needs_merge() || flow_series_has_stats(&select) || select.is_map_output();

    Ok(Q {
        qid: qid.to_string(),
        table,
        requested_t_from,
        requested_t_to,
        t_from,
        t_to,
        where_tree,
        select,
        sort_fields,
        filter,
        limit,
        granularity,
        dir,
        object_id,
        chunks,
        parallelizable,
        merge_needed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONFIG: ParserConfig = ParserConfig { parallel_batches: 4, max_slice: 100 };

    #[test]
    fn message_table_query_parses_and_plans_chunks() {
        let now = Time::from_micros(1_700_000_000_000_000);
        let query = json!({
            "table": "MessageTable",
            "start_time": "now-60s",
            "end_time": "now",
            "select_fields": ["MessageTS", "Messagetype", "ModuleId", "Source", "ObjectLog"],
            "where": "",
            "limit": 100,
        });
        let q = parse_query("q1", &query, now, CONFIG).unwrap();
        assert_eq!(q.table, TableFamily::Messages);
        assert_eq!(q.limit, Some(100));
        assert!(q.parallelizable);
        assert!(!q.chunks.is_empty());
        assert!(!q.is_map_output());
    }

    #[test]
    fn object_value_table_is_not_parallelized_into_multiple_chunks() {
        let now = Time::from_micros(1_700_000_000_000_000);
        let query = json!({
            "table": "ObjectValueTable",
            "start_time": "0",
            "end_time": now.micros().to_string(),
            "select_fields": ["field1"],
            "where": [[{"name": "object_id", "value": "abc", "op": "EQUAL"}]],
        });
        let q = parse_query("q2", &query, now, CONFIG).unwrap();
        assert!(!q.parallelizable);
        assert_eq!(q.chunks.len(), 1);
        assert_eq!(q.object_id.as_deref(), Some("abc"));
    }

    #[test]
    fn ttl_clamp_narrows_a_too_wide_requested_range() {
        let now = Time::from_micros(10 * 3600 * 1_000_000);
        let query = json!({
            "table": "FlowRecordTable",
            "start_time": "0",
            "end_time": now.micros().to_string(),
            "select_fields": [],
            "where": "",
        });
        let q = parse_query("q3", &query, now, CONFIG).unwrap();
        assert!(q.t_from > q.requested_t_from);
        assert!(q.merge_needed); // flow-records always imply merge_needed
    }

    #[test]
    fn flow_series_with_stats_forces_merge_needed() {
        let now = Time::from_micros(1_000_000_000);
        let query = json!({
            "table": "FlowSeriesTable",
            "start_time": "0",
            "end_time": now.micros().to_string(),
            "select_fields": ["T=7", "sum(packets)", "sum(bytes)"],
            "where": "",
        });
        let q = parse_query("q4", &query, now, CONFIG).unwrap();
        assert!(q.merge_needed);
        assert_eq!(q.granularity, Some(7_000_000));
        assert!(q.is_map_output());
    }

    #[test]
    fn missing_start_time_is_bad_message() {
        let now = Time::from_micros(0);
        let query = json!({"table": "MessageTable", "end_time": "now", "select_fields": []});
        let err = parse_query("q5", &query, now, CONFIG).unwrap_err();
        assert!(matches!(err, QueryError::BadMessage { .. }));
    }
}
