//! Builds and runs one query's two-stage pipeline (`spec.md` §4.1, §4.3
//! step 5): stage 0 fans `q.chunks` out across `max_tasks` instances, each
//! drawing chunks from a shared atomic counter and running the WHERE
//! executor (C5) followed by the matching SELECT family (C6); stage 0's
//! merge combines every instance's output exactly once (`merge_needed`'s
//! two entry points, `spec.md` §4.7, collapse to this single combine
//! since both are associative/commutative over a query's chunk set — see
//! `DESIGN.md`); stage 1 writes the combined rows to the result bus.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap as FastMap;
use postproc::{apply_limit, filter_json_rows, filter_rows, sort_json_rows, sort_rows, AutoFilterConfig};
use query_parser::{Q, SelectPlan};
use query_types::{Chunk, ChunkCounter, QueryError};
use schema::TableFamily;
use select_exec::{FsOutputRow, StatsAccumulator};
use serde_json::Value as Json;
use storage_engine::StorageEngine;
use work_pipeline::{AnyValue, ExecuteFn, MergeFn, Pipeline, Stage};

use crate::rows::{render_fs_row, row_attrs, row_to_flow_sample, to_string_row};

/// One stage-0 instance's running fold, keyed by the query's SELECT
/// family. Every shape within a family merges associatively, so a single
/// `fold` implements both the per-instance accumulation and the
/// cross-instance merge.
#[derive(Debug, Clone)]
enum FamilyOutput {
    Fetch(Vec<FastMap<String, String>>),
    FlowSeries(Vec<FsOutputRow>),
    Stats(StatsAccumulator),
}

impl FamilyOutput {
    fn empty(plan: &SelectPlan) -> Self {
        match plan {
            SelectPlan::Fetch { .. } => Self::Fetch(Vec::new()),
            SelectPlan::FlowSeries { .. } => Self::FlowSeries(Vec::new()),
            SelectPlan::Stats { .. } => Self::Stats(StatsAccumulator::new()),
        }
    }

    fn fold(self, other: Self) -> Self {
        match (self, other) {
            (Self::Fetch(mut a), Self::Fetch(b)) => {
                a.extend(b);
                Self::Fetch(a)
            }
            (Self::FlowSeries(mut a), Self::FlowSeries(b)) => {
                a.extend(b);
                Self::FlowSeries(select_exec::merge_output_rows(a))
            }
            (Self::Stats(mut a), Self::Stats(b)) => {
                a.merge_processing(b);
                Self::Stats(a)
            }
            _ => unreachable!("every stage-0 instance folds output of its own query's SELECT family"),
        }
    }
}

/// Executes one chunk's WHERE stage, then materializes it through the
/// query's SELECT family.
async fn execute_chunk(q: &Q, chunk: Chunk, engine: Arc<dyn StorageEngine>) -> Result<FamilyOutput, QueryError> {
    let where_rows = where_exec::execute_where(&q.qid, &q.where_tree, q.table, &chunk, Arc::clone(&engine)).await?;

    match &q.select {
        SelectPlan::Fetch { fields } => {
            let uuids = select_exec::distinct_uuids(&where_rows);
            let cf_name = q.table.uuid_cf_name().ok_or_else(|| QueryError::Invalid {
                qid: q.qid.clone(),
                detail: format!("table {:?} has no per-uuid column family", q.table),
            })?;

            let rows = if matches!(q.table, TableFamily::ObjectLog) {
                select_exec::fetch_object_log_rows(Arc::clone(&engine), cf_name, &uuids, fields)
                    .await
                    .map_err(|source| QueryError::Storage { qid: q.qid.clone(), detail: source.to_string() })?
                    .into_iter()
                    .map(|(routed_field, row)| {
                        let mut m = to_string_row(&row);
                        m.insert("route".to_string(), routed_field.to_string());
                        m
                    })
                    .collect()
            } else {
                select_exec::fetch_rows(Arc::clone(&engine), cf_name, &uuids, fields)
                    .await
                    .map_err(|source| QueryError::Storage { qid: q.qid.clone(), detail: source.to_string() })?
                    .iter()
                    .map(to_string_row)
                    .collect()
            };
            Ok(FamilyOutput::Fetch(rows))
        }
        SelectPlan::FlowSeries { shape, time_dim, tuple_fields, include_class_id } => {
            let samples: Vec<_> = where_rows.iter().map(|r| row_to_flow_sample(r, tuple_fields)).collect();
            let out_rows = select_exec::process_chunk(*shape, *time_dim, &samples, chunk.t_start, chunk.t_end, *include_class_id);
            Ok(FamilyOutput::FlowSeries(out_rows))
        }
        SelectPlan::Stats { tokens } => {
            let mut acc = StatsAccumulator::new();
            for r in &where_rows {
                let raw = row_attrs(r);
                let (unique, agg) = select_exec::process_row(tokens, &raw);
                acc.merge_full_row(unique, agg);
            }
            Ok(FamilyOutput::Stats(acc))
        }
    }
}

fn stage0_execute(q: Arc<Q>, engine: Arc<dyn StorageEngine>, counter: Arc<ChunkCounter>) -> ExecuteFn {
    Arc::new(move |_instance, _input: AnyValue| {
        let q = Arc::clone(&q);
        let engine = Arc::clone(&engine);
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            let mut acc = FamilyOutput::empty(&q.select);
            while let Some(chunk) = counter.draw() {
                let chunk_output = execute_chunk(&q, chunk, Arc::clone(&engine)).await.map_err(|e| e.to_string())?;
                acc = acc.fold(chunk_output);
            }
            Ok(AnyValue::new(acc))
        })
    })
}

/// Renders a combined [`FamilyOutput`] into the generic JSON rows written
/// to the result bus, then applies filter, sort, and limit in that order
/// (`spec.md` §4.7). Filter always runs after the family's merge: even a
/// "non-aggregated" flow-series shape (e.g. `TupleOnly`) carries a
/// `flow_count` that is only complete once every chunk/instance has
/// contributed, so filtering earlier could evaluate a predicate against a
/// partial count.
fn render_filter_sort_limit(
    combined: FamilyOutput,
    sort_fields: &[postproc::SortField],
    filter: &[Vec<predicate::FilterTerm>],
    limit: Option<usize>,
    auto_filter: &AutoFilterConfig,
) -> Vec<BTreeMap<String, Json>> {
    match combined {
        FamilyOutput::Fetch(rows) => {
            let mut rows = filter_rows(rows, filter, auto_filter);
            sort_rows(&mut rows, sort_fields);
            apply_limit(&mut rows, limit);
            rows.into_iter().map(|row| row.into_iter().map(|(k, v)| (k, Json::from(v))).collect()).collect()
        }
        FamilyOutput::FlowSeries(rows) => {
            let rendered: Vec<BTreeMap<String, Json>> = rows.iter().map(render_fs_row).collect();
            let mut rendered = filter_json_rows(rendered, filter, auto_filter);
            sort_json_rows(&mut rendered, sort_fields);
            apply_limit(&mut rendered, limit);
            rendered
        }
        FamilyOutput::Stats(acc) => {
            let rendered: Vec<BTreeMap<String, Json>> = acc.rows().map(|(unique, agg)| select_exec::render_row(unique, agg)).collect();
            let mut rendered = filter_json_rows(rendered, filter, auto_filter);
            sort_json_rows(&mut rendered, sort_fields);
            apply_limit(&mut rendered, limit);
            rendered
        }
    }
}

/// Marks a merge failure caused by the per-query row cap rather than a
/// genuine storage/merge error, so `handler` can surface it as
/// `QueryError::RowCapExceeded` (`-ENOBUFS`) instead of a generic
/// `Storage` failure (`spec.md` §4.3 step 5, §7).
pub const ROW_CAP_MARKER: &str = "row cap exceeded";

fn family_row_count(output: &FamilyOutput) -> usize {
    match output {
        FamilyOutput::Fetch(rows) => rows.len(),
        FamilyOutput::FlowSeries(rows) => rows.len(),
        FamilyOutput::Stats(acc) => acc.rows().count(),
    }
}

fn stage0_merge(q: Arc<Q>, auto_filter: AutoFilterConfig, max_rows: usize) -> MergeFn {
    Arc::new(move |subresults: Vec<AnyValue>, _input: AnyValue| {
        let mut combined = FamilyOutput::empty(&q.select);
        for sub in &subresults {
            combined = combined.fold(sub.downcast_ref::<FamilyOutput>().clone());
        }
        if family_row_count(&combined) > max_rows {
            return Err(ROW_CAP_MARKER.to_string());
        }
        let rows = render_filter_sort_limit(combined, &q.sort_fields, &q.filter, q.limit, &auto_filter);
        Ok(AnyValue::new(rows))
    })
}

/// Serializes the final rows as one JSON object string each, the unit
/// `resultbus::Bus::write_result_rows` writes per result-bus entry
/// (`spec.md` §4.2, §6).
fn render_result_strings(rows: &[BTreeMap<String, Json>]) -> Vec<String> {
    rows.iter().map(|row| Json::Object(row.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).to_string()).collect()
}

/// Builds the two-stage pipeline for one admitted query (`spec.md` §4.3
/// step 5). Stage 1 is a single instance that writes the combined,
/// post-processed rows to the result bus and returns the row count
/// written.
pub fn build(
    q: Arc<Q>,
    engine: Arc<dyn StorageEngine>,
    max_tasks: u32,
    max_rows: usize,
    auto_filter: AutoFilterConfig,
    bus: Arc<resultbus::Bus>,
    conn: Arc<resultbus::BusConnection>,
) -> Pipeline {
    let counter = Arc::new(ChunkCounter::new(q.chunks.clone()));
    let instances = (max_tasks as usize).min(q.chunks.len().max(1));

    let stage0 = Stage::new("where-select", instances, stage0_execute(Arc::clone(&q), Arc::clone(&engine), counter))
        .with_merge(stage0_merge(Arc::clone(&q), auto_filter, max_rows));

    let qid = q.qid.clone();
    let stage1: ExecuteFn = Arc::new(move |_instance, input: AnyValue| {
        let qid = qid.clone();
        let bus = Arc::clone(&bus);
        let conn = Arc::clone(&conn);
        Box::pin(async move {
            let rows = input.downcast_ref::<Vec<BTreeMap<String, Json>>>();
            let row_strings = render_result_strings(rows);
            let written = bus.write_result_rows(&conn, &qid, &row_strings).await.map_err(|e| e.to_string())?;
            bus.push_progress(&conn, &qid, &resultbus::ProgressFrame::done(written, rows.len() as u64))
                .await
                .map_err(|e| e.to_string())?;
            bus.expire_query_hash(&conn, &qid).await.map_err(|e| e.to_string())?;
            bus.remove_from_engine_queue(&conn, &qid).await.map_err(|e| e.to_string())?;
            Ok(AnyValue::new(written))
        })
    });
    let stage1 = Stage::new("write-results", 1, stage1);

    Pipeline::new(vec![stage0, stage1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use postproc::{SortDirection, SortField};
    use predicate::{FilterTerm, Op};
    use schema::Datatype;

    #[test]
    fn family_output_fold_concatenates_fetch_rows() {
        let a = FamilyOutput::Fetch(vec![FastMap::from([("a".to_string(), "1".to_string())])]);
        let b = FamilyOutput::Fetch(vec![FastMap::from([("a".to_string(), "2".to_string())])]);
        match a.fold(b) {
            FamilyOutput::Fetch(rows) => assert_eq!(rows.len(), 2),
            _ => panic!("expected fetch family"),
        }
    }

    #[test]
    fn family_output_fold_merges_stats_accumulators() {
        let tokens = vec![select_exec::StatToken::Unique("attrA".to_string()), select_exec::StatToken::Sum("packets".to_string())];
        let mut acc_a = StatsAccumulator::new();
        let raw_a: BTreeMap<String, query_types::DbDataValue> =
            [("attrA".to_string(), query_types::DbDataValue::String("x".into())), ("packets".to_string(), query_types::DbDataValue::U64(1))].into();
        let (u, agg) = select_exec::process_row(&tokens, &raw_a);
        acc_a.merge_full_row(u, agg);

        let mut acc_b = StatsAccumulator::new();
        let raw_b: BTreeMap<String, query_types::DbDataValue> =
            [("attrA".to_string(), query_types::DbDataValue::String("x".into())), ("packets".to_string(), query_types::DbDataValue::U64(2))].into();
        let (u, agg) = select_exec::process_row(&tokens, &raw_b);
        acc_b.merge_full_row(u, agg);

        let combined = FamilyOutput::Stats(acc_a).fold(FamilyOutput::Stats(acc_b));
        match combined {
            FamilyOutput::Stats(acc) => assert_eq!(acc.rows().count(), 1, "same attrA group collapses into one row"),
            _ => panic!("expected stats family"),
        }
    }

    #[test]
    fn render_filter_sort_limit_applies_in_documented_order() {
        let rows = FamilyOutput::Fetch(vec![
            FastMap::from([("n".to_string(), "2".to_string())]),
            FastMap::from([("n".to_string(), "5".to_string())]),
            FastMap::from([("n".to_string(), "9".to_string())]),
        ]);
        let sort_fields = vec![SortField::new("n", Datatype::Int, SortDirection::Descending)];
        let filter = vec![vec![FilterTerm::new("n", Op::Geq, "3", Datatype::Int)]];
        let out = render_filter_sort_limit(rows, &sort_fields, &filter, Some(1), &AutoFilterConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["n"], Json::from(9));
    }
}
