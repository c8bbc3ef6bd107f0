//! `StatsSelect`: streaming aggregation over dynamic stat-table attribute
//! rows (`spec.md` §4.6 "StatsSelect").
//!
//! Rows are folded into a registry keyed by a 64-bit hash of their
//! unique-columns map (`MergeFullRow`); identical unique-columns collapse
//! and merge their aggregate cells element-wise, a hash collision between
//! distinct unique-columns maps inserts a second row under the same hash
//! bucket. `spec.md` §4.6 also describes a `sort-vector` whose last slot
//! carries this hash; since every lookup here already goes through the
//! hash (see [`StatsAccumulator::merge_full_row`]), the accumulator keeps
//! the bucket structure directly rather than a separate sort-vector
//! indirection — the observable merge semantics (associative,
//! commutative, collision-safe) are identical.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use hashbrown::HashMap;
use query_types::DbDataValue;
use serde_json::Value as Json;
use tdigest::TDigest;
use twox_hash::XxHash64;

/// One recognized `StatsSelect` SELECT token (`spec.md` §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatToken {
    /// A grouping (non-aggregated) column.
    Unique(String),
    Sum(String),
    Count(String),
    /// Equivalence-class hash over the row's other non-grouped columns,
    /// minus the classified column itself
    /// (`spec.md` §8 boundary scenario 4).
    Class(String),
    Min(String),
    Max(String),
    Avg(String),
    Percentiles(String),
}

impl StatToken {
    /// The output column name this token renders under.
    pub fn output_name(&self) -> String {
        match self {
            Self::Unique(n) => n.clone(),
            Self::Sum(n) => format!("SUM({n})"),
            Self::Count(n) => format!("COUNT({n})"),
            Self::Class(n) => format!("CLASS({n})"),
            Self::Min(n) => format!("MIN({n})"),
            Self::Max(n) => format!("MAX({n})"),
            Self::Avg(n) => format!("AVG({n})"),
            Self::Percentiles(n) => format!("PERCENTILES({n})"),
        }
    }
}

const PERCENTILE_COMPRESSION: usize = 100;

/// One aggregate cell's running state, one per non-unique SELECT token.
#[derive(Debug, Clone)]
pub enum AggCell {
    Sum(DbDataValue),
    Count(u64),
    Class(u64),
    Min(DbDataValue),
    Max(DbDataValue),
    Avg { sum: f64, count: u64 },
    Percentiles(TDigest),
}

impl AggCell {
    /// Merges `other` into `self` in place, per `spec.md` §4.6's merge
    /// law table.
    pub fn merge(&mut self, other: &Self) {
        match (self, other) {
            (Self::Sum(a), Self::Sum(b)) => *a = a.add(b),
            (Self::Count(a), Self::Count(b)) => *a += b,
            (Self::Class(_), Self::Class(_)) => {}
            (Self::Min(a), Self::Min(b)) => *a = a.extremum(b, false),
            (Self::Max(a), Self::Max(b)) => *a = a.extremum(b, true),
            (Self::Avg { sum, count }, Self::Avg { sum: s2, count: c2 }) => {
                *sum += s2;
                *count += c2;
            }
            (Self::Percentiles(a), Self::Percentiles(b)) => {
                *a = TDigest::merge_digests(vec![a.clone(), b.clone()]);
            }
            (a, b) => {
                debug_assert!(false, "mismatched aggregate kinds: {a:?} vs {b:?}");
            }
        }
    }

    /// Renders this aggregate for the final output row, per `spec.md`
    /// §4.6 "At emit time".
    pub fn render(&self) -> Json {
        match self {
            Self::Sum(v) | Self::Min(v) | Self::Max(v) => v.to_json(),
            Self::Count(v) => Json::from(*v),
            Self::Class(v) => Json::from(*v),
            Self::Avg { sum, count } => {
                let mean = if *count == 0 { 0.0 } else { sum / *count as f64 };
                Json::from(mean)
            }
            Self::Percentiles(digest) => {
                let mut obj = serde_json::Map::new();
                for (key, q) in [("01", 0.01), ("05", 0.05), ("25", 0.25), ("50", 0.50), ("75", 0.75), ("95", 0.95), ("99", 0.99)] {
                    obj.insert(key.to_string(), Json::from(digest.estimate_quantile(q)));
                }
                Json::Object(obj)
            }
        }
    }
}

fn hash_map(map: &BTreeMap<String, String>) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    for (k, v) in map {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}

/// Builds one raw attribute row's unique-columns map and aggregate row
/// from the parsed SELECT tokens (`spec.md` §4.6 steps 1-3).
pub fn process_row(tokens: &[StatToken], raw: &BTreeMap<String, DbDataValue>) -> (BTreeMap<String, DbDataValue>, BTreeMap<String, AggCell>) {
    let unique_names: hashbrown::HashSet<String> = tokens
        .iter()
        .filter_map(|t| if let StatToken::Unique(n) = t { Some(n.clone()) } else { None })
        .collect();

    let mut unique = BTreeMap::new();
    let mut agg = BTreeMap::new();

    for token in tokens {
        match token {
            StatToken::Unique(name) => {
                if let Some(v) = raw.get(name) {
                    unique.insert(name.clone(), v.clone());
                }
            }
            StatToken::Sum(name) => {
                if let Some(v) = raw.get(name) {
                    agg.insert(token.output_name(), AggCell::Sum(v.clone()));
                }
            }
            StatToken::Count(_) => {
                // Counts rows, not non-null attributes (`spec.md` §4.6
                // step 3: "for each `COUNT(X)` emit `1u64`").
                agg.insert(token.output_name(), AggCell::Count(1));
            }
            StatToken::Class(name) => {
                let others: BTreeMap<String, String> = raw
                    .iter()
                    .filter(|(k, _)| *k != name && !unique_names.contains(k.as_str()))
                    .map(|(k, v)| (k.clone(), v.to_display_string()))
                    .collect();
                agg.insert(token.output_name(), AggCell::Class(hash_map(&others)));
            }
            StatToken::Min(name) => {
                if let Some(v) = raw.get(name) {
                    agg.insert(token.output_name(), AggCell::Min(v.clone()));
                }
            }
            StatToken::Max(name) => {
                if let Some(v) = raw.get(name) {
                    agg.insert(token.output_name(), AggCell::Max(v.clone()));
                }
            }
            StatToken::Avg(name) => {
                if let Some(v) = raw.get(name).and_then(DbDataValue::as_f64) {
                    agg.insert(token.output_name(), AggCell::Avg { sum: v, count: 1 });
                }
            }
            StatToken::Percentiles(name) => {
                if let Some(v) = raw.get(name).and_then(DbDataValue::as_f64) {
                    let digest = TDigest::new_with_size(PERCENTILE_COMPRESSION).merge_unsorted(vec![v]);
                    agg.insert(token.output_name(), AggCell::Percentiles(digest));
                }
            }
        }
    }
    (unique, agg)
}

type Row = (BTreeMap<String, DbDataValue>, BTreeMap<String, AggCell>);

/// `MergeFullRow` registry (`spec.md` §4.6 step 4).
#[derive(Debug, Default, Clone)]
pub struct StatsAccumulator {
    buckets: HashMap<u64, Vec<Row>>,
}

fn unique_key(unique: &BTreeMap<String, DbDataValue>) -> BTreeMap<String, String> {
    unique.iter().map(|(k, v)| (k.clone(), v.to_display_string())).collect()
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs one processed row, merging into an existing bucket entry
    /// when the unique-columns maps match, inserting a sibling entry on
    /// hash collision.
    pub fn merge_full_row(&mut self, unique: BTreeMap<String, DbDataValue>, agg: BTreeMap<String, AggCell>) {
        let hash = hash_map(&unique_key(&unique));
        let bucket = self.buckets.entry(hash).or_default();
        match bucket.iter_mut().find(|(u, _)| *u == unique) {
            Some((_, existing_agg)) => {
                for (name, cell) in agg {
                    existing_agg.entry(name).and_modify(|e| e.merge(&cell)).or_insert(cell);
                }
            }
            None => bucket.push((unique, agg)),
        }
    }

    /// `merge_processing` for StatsSelect: folds another chunk's
    /// accumulator into this one, row by row.
    pub fn merge_processing(&mut self, other: Self) {
        for (_, rows) in other.buckets {
            for (unique, agg) in rows {
                self.merge_full_row(unique, agg);
            }
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.buckets.values().flatten()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.buckets.into_values().flatten().collect()
    }
}

/// `final_merge_processing`'s `MergeFinal` for StatsSelect: absorbs every
/// per-chunk accumulator into one (`spec.md` §4.7).
pub fn merge_final(chunks: Vec<StatsAccumulator>) -> StatsAccumulator {
    let mut out = StatsAccumulator::new();
    for chunk in chunks {
        out.merge_processing(chunk);
    }
    out
}

/// Renders one accumulated row as the final JSON output row.
pub fn render_row(unique: &BTreeMap<String, DbDataValue>, agg: &BTreeMap<String, AggCell>) -> BTreeMap<String, Json> {
    let mut out: BTreeMap<String, Json> = unique.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
    for (name, cell) in agg {
        out.insert(name.clone(), cell.render());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, DbDataValue)]) -> BTreeMap<String, DbDataValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn sum_and_count_accumulate_across_rows() {
        let tokens = vec![StatToken::Unique("attrA".into()), StatToken::Sum("packets".into()), StatToken::Count("packets".into())];
        let mut acc = StatsAccumulator::new();
        for pkts in [1u64, 2, 3] {
            let raw = row(&[("attrA", DbDataValue::String("x".into())), ("packets", DbDataValue::U64(pkts))]);
            let (unique, agg) = process_row(&tokens, &raw);
            acc.merge_full_row(unique, agg);
        }
        let rows: Vec<_> = acc.into_rows();
        assert_eq!(rows.len(), 1);
        let (_, agg) = &rows[0];
        match &agg["SUM(packets)"] {
            AggCell::Sum(DbDataValue::U64(v)) => assert_eq!(*v, 6),
            other => panic!("unexpected {other:?}"),
        }
        match &agg["COUNT(packets)"] {
            AggCell::Count(v) => assert_eq!(*v, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn count_counts_rows_not_present_attributes() {
        // spec.md §4.6 step 3: "for each COUNT(X) emit 1u64" — COUNT is a
        // row count, not an attribute-presence count.
        let tokens = vec![StatToken::Unique("attrA".into()), StatToken::Count("packets".into())];
        let mut acc = StatsAccumulator::new();
        let with_attr = row(&[("attrA", DbDataValue::String("x".into())), ("packets", DbDataValue::U64(1))]);
        let without_attr = row(&[("attrA", DbDataValue::String("x".into()))]);
        for raw in [with_attr, without_attr] {
            let (unique, agg) = process_row(&tokens, &raw);
            acc.merge_full_row(unique, agg);
        }
        let rows: Vec<_> = acc.into_rows();
        assert_eq!(rows.len(), 1);
        match &rows[0].1["COUNT(packets)"] {
            AggCell::Count(v) => assert_eq!(*v, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn class_hashes_only_nongrouped_columns() {
        // spec.md §8 boundary scenario 4: select_fields ["attrA", "CLASS(attrB)"].
        let tokens = vec![StatToken::Unique("attrA".into()), StatToken::Class("attrB".into())];
        let mut acc = StatsAccumulator::new();
        for (a, b) in [("x", 1u64), ("x", 2), ("y", 1)] {
            let raw = row(&[("attrA", DbDataValue::String(a.into())), ("attrB", DbDataValue::U64(b))]);
            let (unique, agg) = process_row(&tokens, &raw);
            acc.merge_full_row(unique, agg);
        }
        let rows = acc.into_rows();
        assert_eq!(rows.len(), 2, "rows with distinct attrA form separate groups");
        for (_, agg) in &rows {
            match agg["CLASS(attrB)"] {
                AggCell::Class(h) => assert_eq!(h, hash_map(&BTreeMap::new()), "no columns remain once attrB is excluded"),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn percentiles_estimate_within_tolerance() {
        // spec.md §8 boundary scenario 5.
        let tokens = vec![StatToken::Percentiles("v".into())];
        let mut acc = StatsAccumulator::new();
        for i in 0..200u64 {
            let raw = row(&[("v", DbDataValue::Double(i as f64 * 100.0 / 200.0))]);
            let (unique, agg) = process_row(&tokens, &raw);
            acc.merge_full_row(unique, agg);
        }
        let rows = acc.into_rows();
        assert_eq!(rows.len(), 1);
        let (_, agg) = &rows[0];
        let AggCell::Percentiles(digest) = &agg["PERCENTILES(v)"] else { panic!("expected percentiles") };
        assert!((digest.estimate_quantile(0.50) - 50.0).abs() <= 1.0);
        assert!((digest.estimate_quantile(0.95) - 95.0).abs() <= 1.0);
    }

    #[test]
    fn merge_processing_is_order_independent() {
        let tokens = vec![StatToken::Unique("attrA".into()), StatToken::Sum("packets".into())];
        let raw_a = row(&[("attrA", DbDataValue::String("x".into())), ("packets", DbDataValue::U64(1))]);
        let raw_b = row(&[("attrA", DbDataValue::String("x".into())), ("packets", DbDataValue::U64(2))]);

        let mut acc_ab = StatsAccumulator::new();
        let (u, a) = process_row(&tokens, &raw_a);
        acc_ab.merge_full_row(u, a);
        let (u, a) = process_row(&tokens, &raw_b);
        acc_ab.merge_full_row(u, a);

        let mut acc_a = StatsAccumulator::new();
        let (u, a) = process_row(&tokens, &raw_a);
        acc_a.merge_full_row(u, a);
        let mut acc_b = StatsAccumulator::new();
        let (u, a) = process_row(&tokens, &raw_b);
        acc_b.merge_full_row(u, a);
        let merged = merge_final(vec![acc_a, acc_b]);

        let sum_ab = match &acc_ab.into_rows()[0].1["SUM(packets)"] {
            AggCell::Sum(DbDataValue::U64(v)) => *v,
            _ => unreachable!(),
        };
        let sum_merged = match &merged.into_rows()[0].1["SUM(packets)"] {
            AggCell::Sum(DbDataValue::U64(v)) => *v,
            _ => unreachable!(),
        };
        assert_eq!(sum_ab, sum_merged);
    }
}
