//! Compiles a `predicate::WhereTree` into `DbQueryUnit`s for a given
//! table family and chunk (`spec.md` §4.5).

use predicate::{MatchTerm, Op, WhereTree};
use query_types::{Chunk, DbDataValue, PARTITION_MAX, PARTITION_MIN};
use schema::{ColumnFamilyDescriptor, ColumnNameRange, TableFamily};

use crate::unit::{DbQueryUnit, UnitRowKey};

const ROW_TIME_BITS: u32 = query_types::ROW_TIME_BITS;

/// The `t2` buckets a chunk spans, i.e. every distinct high-order
/// timestamp bucket touched by `[chunk.t_start, chunk.t_end)`.
fn t2_buckets(chunk: &Chunk) -> Vec<u64> {
    let first = chunk.t_start >> ROW_TIME_BITS;
    let last = (chunk.t_end.saturating_sub(1)) >> ROW_TIME_BITS;
    (first..=last).collect()
}

fn row_keys_for(
    chunk: &Chunk,
    suffix: Vec<DbDataValue>,
    partitions: Option<(u8, u8)>,
    is_si: Option<&[u8]>,
) -> Vec<UnitRowKey> {
    let mut keys = Vec::new();
    for t2 in t2_buckets(chunk) {
        let parts: Vec<u8> = match partitions {
            Some((lo, hi)) => (lo..=hi).collect(),
            None => vec![0],
        };
        let si_values: Vec<Option<u8>> = match is_si {
            Some(values) => values.iter().map(|v| Some(*v)).collect(),
            None => vec![None],
        };
        for p in &parts {
            for si in &si_values {
                let mut key_parts = vec![DbDataValue::U64(t2)];
                key_parts.extend(suffix.clone());
                if partitions.is_some() {
                    key_parts.push(DbDataValue::U8(*p));
                }
                if let Some(si) = si {
                    key_parts.push(DbDataValue::U8(*si));
                }
                keys.push(UnitRowKey { key: storage_engine::RowKey::new(key_parts), t2_bucket: t2 });
            }
        }
    }
    keys
}

fn full_column_range() -> ColumnNameRange {
    ColumnNameRange::new(DbDataValue::U64(0), DbDataValue::U64(u64::MAX))
}

/// Synthesizes the single scan used for an empty WHERE group
/// (`spec.md` §4.5 "Empty WHERE").
pub fn empty_where_unit(table: TableFamily, chunk: &Chunk) -> DbQueryUnit {
    let (cf_name, partitions): (&str, Option<(u8, u8)>) = match table {
        TableFamily::Messages => ("MessageTableTimestamp", None),
        TableFamily::FlowRecords | TableFamily::FlowSeries => ("FlowTableProtSp", Some((PARTITION_MIN, PARTITION_MAX))),
        TableFamily::ObjectLog | TableFamily::ObjectValue => ("ObjectTable", None),
        TableFamily::SessionRecords => ("SessionTable", Some((PARTITION_MIN, PARTITION_MAX))),
        TableFamily::Stats => ("StatTable", None),
    };
    let row_keys = row_keys_for(chunk, Vec::new(), partitions, None);
    DbQueryUnit { cf: ColumnFamilyDescriptor::new(cf_name, Vec::new(), full_column_range()), row_keys }
}

/// Compiles one AND-group of compiled match terms into one or more
/// `DbQueryUnit`s. Multi-field flow terms (`vrouter+svn+sip`,
/// `svn+sip`, `dvn+dip`, `proto+sport`, `proto+dport`) compose into a
/// single composite CF's row-key suffix; every other term gets its own
/// CF scan (`spec.md` §4.5).
pub fn compile_and_group(terms: &[MatchTerm], table: TableFamily, chunk: &Chunk) -> Vec<DbQueryUnit> {
    if terms.is_empty() {
        return vec![empty_where_unit(table, chunk)];
    }

    let partitions = match table {
        TableFamily::FlowRecords | TableFamily::FlowSeries | TableFamily::SessionRecords => {
            Some((PARTITION_MIN, PARTITION_MAX))
        }
        _ => None,
    };

    let mut units = Vec::new();
    let mut consumed = vec![false; terms.len()];

    // Composite flow-tuple groups, most specific first.
    let composites: &[(&str, &[&str])] = &[
        ("FlowTableSVNSIP", &["vrouter", "svn", "sip"]),
        ("FlowTableSVNSIP", &["svn", "sip"]),
        ("FlowTableDVNDIP", &["dvn", "dip"]),
        ("FlowTableProtSp", &["proto", "sport"]),
        ("FlowTableProtDp", &["proto", "dport"]),
    ];
    if matches!(table, TableFamily::FlowRecords | TableFamily::FlowSeries) {
        for (cf_name, fields) in composites {
            let indices: Vec<usize> = fields
                .iter()
                .filter_map(|f| terms.iter().position(|t| t.name == **f).filter(|&i| !consumed[i]))
                .collect();
            if indices.len() == fields.len() {
                let suffix: Vec<DbDataValue> = indices.iter().map(|&i| terms[i].value.clone()).collect();
                let row_keys = row_keys_for(chunk, suffix, partitions, None);
                units.push(DbQueryUnit { cf: ColumnFamilyDescriptor::new(*cf_name, Vec::new(), full_column_range()), row_keys });
                for i in indices {
                    consumed[i] = true;
                }
            }
        }
    }

    for (i, term) in terms.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        let cf_name = single_term_cf_name(table, &term.name);
        let suffix = vec![term.value.clone()];
        let row_keys = row_keys_for(chunk, suffix, partitions, None);
        units.push(DbQueryUnit { cf: ColumnFamilyDescriptor::new(cf_name, Vec::new(), full_column_range()), row_keys });
    }

    if units.is_empty() {
        units.push(empty_where_unit(table, chunk));
    }
    units
}

fn single_term_cf_name(table: TableFamily, field: &str) -> String {
    match table {
        TableFamily::Stats => format!("StatTableByTag{field}"),
        _ => format!("{table:?}By{field}"),
    }
}

/// Compiles a full OR-of-ANDs `WhereTree` into one `Vec<DbQueryUnit>` per
/// OR branch.
pub fn compile_where(tree: &WhereTree, table: TableFamily, chunk: &Chunk) -> Vec<Vec<DbQueryUnit>> {
    if tree.is_empty() {
        return vec![vec![empty_where_unit(table, chunk)]];
    }
    tree.iter().map(|and_group| compile_and_group(and_group, table, chunk)).collect()
}

/// Exposed for callers that need to distinguish range terms when
/// composing row keys (kept here rather than in `predicate` since only
/// the compiler needs to know which op values mean "scan the whole
/// range").
pub fn is_range_term(term: &MatchTerm) -> bool {
    matches!(term.op, Op::InRange) || term.value2.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::plan_chunks;

    fn chunk() -> Chunk {
        plan_chunks(0, 1 << 25, 1 << 25)[0]
    }

    #[test]
    fn empty_where_synthesizes_one_unit_per_family() {
        let unit = empty_where_unit(TableFamily::Messages, &chunk());
        assert_eq!(unit.cf.name, "MessageTableTimestamp");
    }

    #[test]
    fn composite_flow_terms_compose_one_cf() {
        let terms = vec![
            MatchTerm::new("svn", DbDataValue::U64(1), Op::Equal),
            MatchTerm::new("sip", DbDataValue::U64(2), Op::Equal),
        ];
        let units = compile_and_group(&terms, TableFamily::FlowRecords, &chunk());
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].cf.name, "FlowTableSVNSIP");
    }

    #[test]
    fn unrelated_terms_get_separate_units() {
        let terms = vec![
            MatchTerm::new("vrouter", DbDataValue::U64(1), Op::Equal),
            MatchTerm::new("bytes", DbDataValue::U64(100), Op::Geq),
        ];
        let units = compile_and_group(&terms, TableFamily::FlowRecords, &chunk());
        assert_eq!(units.len(), 2);
    }
}
