//! Per-query admission and completion (`spec.md` §4.3): reads the query
//! hash, parses and plans it, enforces the admission invariants, runs
//! the two-stage pipeline, and reports the terminal progress frame.

use std::collections::HashMap;
use std::sync::Arc;

use observability_deps::tracing::{info, warn};
use postproc::AutoFilterConfig;
use qe_time::TimeProvider;
use query_parser::ParserConfig;
use query_types::QueryError;
use resultbus::{Bus, BusConnection, BusError, ProgressFrame};
use serde_json::Value as Json;
use storage_engine::StorageEngine;
use work_pipeline::{AnyValue, PipelineError};

use crate::pipeline;
use crate::slots::PipelineSlots;

/// The one early heartbeat published on admission (`spec.md` §4.3 step 6).
const ADMISSION_PROGRESS: i64 = 15;

/// Builds one query's JSON parameter object from the raw `QUERY:<qid>`
/// field hash. Array/object-shaped fields (`select_fields`, `where`,
/// `filter`, `sort_fields`) are stored as JSON-encoded strings in the
/// hash; scalar fields (`table`, `start_time`, ...) are stored as their
/// plain string value. A value that fails to parse as JSON is kept as a
/// bare JSON string, which covers the scalar fields uniformly.
fn hash_to_query_json(hash: HashMap<String, String>) -> Json {
    let mut obj = serde_json::Map::with_capacity(hash.len());
    for (field, value) in hash {
        let parsed = serde_json::from_str(&value).unwrap_or_else(|_| Json::String(value));
        obj.insert(field, parsed);
    }
    Json::Object(obj)
}

/// Translates an admission-time `BusError` into the matching `spec.md`
/// §7 negative progress code.
fn admission_error(qid: &str, err: BusError) -> QueryError {
    match err {
        BusError::NoConnection => QueryError::Admission { qid: qid.to_string(), detail: "No Redis Connection".to_string() },
        BusError::MissingHash { .. } => QueryError::Admission { qid: qid.to_string(), detail: "QUERY hash missing".to_string() },
        BusError::Redis { source } => QueryError::Admission { qid: qid.to_string(), detail: source.to_string() },
    }
}

/// Translates a pipeline run failure into the matching `spec.md` §7
/// negative progress code. A merge failure carrying
/// [`pipeline::ROW_CAP_MARKER`] is the one case the pipeline's plain
/// `String` error channel cannot express structurally; every other
/// failure is a storage/merge error (`-EIO`).
fn pipeline_error(qid: &str, err: PipelineError) -> QueryError {
    match err {
        PipelineError::MergeFailed { detail, .. } if detail == pipeline::ROW_CAP_MARKER => QueryError::RowCapExceeded { qid: qid.to_string() },
        other => QueryError::Storage { qid: qid.to_string(), detail: other.to_string() },
    }
}

/// Runs one admitted query end to end (`spec.md` §4.3). Never returns an
/// error: every failure mode is reported to the result bus as a negative
/// progress frame and then this function returns, having freed the
/// admission slot and the pinned connection's pipeline count via `Drop`.
pub async fn handle_query(
    qid: String,
    bus: Arc<Bus>,
    engine: Arc<dyn StorageEngine>,
    slots: Arc<PipelineSlots>,
    time_provider: Arc<dyn TimeProvider>,
    parser_config: ParserConfig,
    max_tasks: u32,
    max_rows: usize,
) {
    let admission = match slots.try_admit(&qid) {
        Ok(admission) => admission,
        Err(err) => {
            warn!(qid, %err, "query refused at admission");
            report_failure_without_connection(&bus, &qid, err).await;
            return;
        }
    };

    let conn = bus.least_loaded_worker();
    conn.inc_pipeline_count();

    if let Err(err) = run_admitted(&qid, &bus, &conn, Arc::clone(&engine), time_provider, parser_config, max_tasks, max_rows).await {
        warn!(qid, %err, "query failed");
        let _ = bus.push_progress(&conn, &qid, &ProgressFrame::error(err.progress_code())).await;
        let _ = bus.remove_from_engine_queue(&conn, &qid).await;
    }

    conn.dec_pipeline_count();
    drop(admission);
}

/// Reports an admission-time failure that never picked a pinned
/// connection (over-cap, duplicate qid). Still owes the engine queue an
/// `LREM`: `spec.md` §7 "in either case the engine-queue entry is removed
/// last", and `BRPOPLPUSH` has already pushed `qid` there regardless of
/// how admission turns out.
async fn report_failure_without_connection(bus: &Bus, qid: &str, err: QueryError) {
    let conn = bus.least_loaded_worker();
    let _ = bus.push_progress(&conn, qid, &ProgressFrame::error(err.progress_code())).await;
    let _ = bus.remove_from_engine_queue(&conn, qid).await;
}

async fn run_admitted(
    qid: &str,
    bus: &Arc<Bus>,
    conn: &Arc<BusConnection>,
    engine: Arc<dyn StorageEngine>,
    time_provider: Arc<dyn TimeProvider>,
    parser_config: ParserConfig,
    max_tasks: u32,
    max_rows: usize,
) -> Result<(), QueryError> {
    let hash = bus.read_query_hash(conn, qid).await.map_err(|e| admission_error(qid, e))?;
    let query_json = hash_to_query_json(hash);

    let now = time_provider.now();
    let q = query_parser::parse_query(qid, &query_json, now, parser_config)?;
    info!(qid, table = ?q.table, chunks = q.chunks.len(), "query admitted");

    bus.push_progress(conn, qid, &ProgressFrame::heartbeat(ADMISSION_PROGRESS)).await.map_err(|e| admission_error(qid, e))?;

    let auto_filter = AutoFilterConfig { is_global_message_table: false, self_filter_disabled: false, self_module: None };
    let pipeline = pipeline::build(Arc::new(q), engine, max_tasks, max_rows, auto_filter, Arc::clone(bus), Arc::clone(conn));

    pipeline.run(AnyValue::new(())).await.map_err(|e| pipeline_error(qid, e))?;
    Ok(())
}
