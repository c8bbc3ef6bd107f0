//! `DbQueryUnit`: one composite-CF scan plus the sub-pipeline that fetches
//! it (`spec.md` §4.5 "Compiled term").

use std::sync::Arc;

use query_types::{Chunk, RowHandle, ROW_TIME_BITS};
use schema::ColumnFamilyDescriptor;
use storage_engine::{Consistency, StorageEngine};
use work_pipeline::{AnyValue, ExecuteFn, MergeFn, Pipeline, Stage};

/// One row key to scan, tagged with the `t2` time bucket it represents so
/// the fetched columns' `t1` offsets can be recombined into a full
/// timestamp.
#[derive(Debug, Clone)]
pub struct UnitRowKey {
    pub key: storage_engine::RowKey,
    pub t2_bucket: u64,
}

/// A single composite column-family scan compiled from one WHERE
/// AND-group term (or group of multi-field terms), per `spec.md` §4.5.
#[derive(Debug, Clone)]
pub struct DbQueryUnit {
    pub cf: ColumnFamilyDescriptor,
    pub row_keys: Vec<UnitRowKey>,
}

fn combine_timestamp(t2_bucket: u64, t1_offset: u64) -> u64 {
    (t2_bucket << ROW_TIME_BITS) | (t1_offset & ((1 << ROW_TIME_BITS) - 1))
}

/// Runs one `DbQueryUnit` as a `work_pipeline` sub-pipeline whose stage-0
/// instance count equals the number of row keys (`spec.md` §4.5): each
/// instance issues one `get_row_async`, merge concatenates every
/// instance's cells, and the result is sorted into row-handle total
/// order before returning. Rows outside `chunk`'s range are discarded.
pub async fn fetch_unit(
    unit: &DbQueryUnit,
    engine: Arc<dyn StorageEngine>,
    chunk: &Chunk,
) -> Result<Vec<RowHandle>, String> {
    let instances = unit.row_keys.len().max(1);
    let execute: ExecuteFn = {
        let engine = Arc::clone(&engine);
        let unit = unit.clone();
        Arc::new(move |instance, _input: AnyValue| {
            let engine = Arc::clone(&engine);
            let unit = unit.clone();
            Box::pin(async move {
                if instance >= unit.row_keys.len() {
                    return Ok(AnyValue::new(Vec::<(u64, storage_engine::ColumnCell)>::new()));
                }
                let row_key = &unit.row_keys[instance];
                let cells = engine
                    .get_row_async(&unit.cf.name, &row_key.key, &unit.cf.column_range, &[], Consistency::One)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(AnyValue::new(
                    cells.into_iter().map(|c| (row_key.t2_bucket, c)).collect::<Vec<_>>(),
                ))
            })
        })
    };
    let merge: MergeFn = Arc::new(|subresults, _input| {
        let mut all = Vec::new();
        for v in subresults {
            all.extend(v.downcast_ref::<Vec<(u64, storage_engine::ColumnCell)>>().iter().cloned());
        }
        Ok(AnyValue::new(all))
    });
    let stage = Stage::new("where_fetch", instances, execute).with_merge(merge);
    let pipeline = Pipeline::new(vec![stage]);
    let result = pipeline.run(AnyValue::new(())).await.map_err(|e| e.to_string())?;
    let cells = result.downcast_ref::<Vec<(u64, storage_engine::ColumnCell)>>().clone();

    let mut rows: Vec<RowHandle> = cells
        .into_iter()
        .filter_map(|(t2_bucket, cell)| {
            let t1 = cell.name.as_u64().unwrap_or(0);
            let ts = combine_timestamp(t2_bucket, t1);
            if ts < chunk.t_start || ts >= chunk.t_end {
                return None;
            }
            Some(RowHandle::new(ts, cell.values))
        })
        .collect();
    rows.sort();
    Ok(rows)
}
