//! Top-level WHERE executor: compile, fetch, and combine one chunk's
//! result (`spec.md` §4.5).

use std::sync::Arc;

use predicate::WhereTree;
use query_types::{Chunk, QueryError, RowHandle};
use schema::TableFamily;
use storage_engine::StorageEngine;

use crate::compile::compile_where;
use crate::setops::{dedup_flow_by_uuid, intersect_all, union_all};
use crate::unit::fetch_unit;

/// Runs the full WHERE pipeline for one chunk: compile the tree into
/// scan units, fetch every unit, AND-intersect within each OR branch,
/// OR-union the branches, then (for flow-record queries) dedup by UUID.
/// Any storage failure short-circuits further fetches for that chunk
/// and surfaces as `QueryError::Storage` (`spec.md` §4.5 "Failure
/// propagation").
pub async fn execute_where(
    qid: &str,
    tree: &WhereTree,
    table: TableFamily,
    chunk: &Chunk,
    engine: Arc<dyn StorageEngine>,
) -> Result<Vec<RowHandle>, QueryError> {
    let branches = compile_where(tree, table, chunk);

    let mut or_results = Vec::with_capacity(branches.len());
    for and_units in branches {
        let mut and_results = Vec::with_capacity(and_units.len());
        for unit in &and_units {
            let rows = fetch_unit(unit, Arc::clone(&engine), chunk).await.map_err(|detail| {
                QueryError::Storage { qid: qid.to_string(), detail }
            })?;
            and_results.push(rows);
        }
        or_results.push(intersect_all(and_results));
    }

    let mut combined = union_all(or_results);
    if matches!(table, TableFamily::FlowRecords) {
        combined = dedup_flow_by_uuid(combined);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::{plan_chunks, DbDataValue};
    use storage_engine::{ColumnCell, InMemoryEngine, RowKey};

    fn seed_message_row(engine: &InMemoryEngine, t2: u64, t1: u64, uuid: &str) {
        engine.put_row(
            "MessageTableTimestamp",
            RowKey::new(vec![DbDataValue::U64(t2)]),
            vec![ColumnCell { name: DbDataValue::U64(t1), values: vec![DbDataValue::String(uuid.to_string())] }],
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_where_returns_rows_in_chunk_range() {
        let engine = Arc::new(InMemoryEngine::new());
        let chunk = plan_chunks(0, 1 << 25, 1 << 25)[0];
        seed_message_row(&engine, 0, 10, "u1");
        seed_message_row(&engine, 0, 20, "u2");

        let result = execute_where("q1", &Vec::new(), TableFamily::Messages, &chunk, engine)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].timestamp < result[1].timestamp);
    }
}
