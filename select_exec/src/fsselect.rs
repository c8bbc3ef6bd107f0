//! Flow-series matrix (`spec.md` §4.6 "Flow-series matrix").
//!
//! The SELECT is classified along three independent axes — whether `T`
//! is selected (and if so, raw or time-binned), whether a flow-tuple
//! projection is selected, and whether any stats aggregate
//! (`sum(packets)`/`sum(bytes)`/`flow_count`) is selected — into one of
//! seven intermediate-state *shapes*, each crossed with the raw-vs-
//! binned `T` axis where both make sense. `spec.md` §4.4 describes this
//! as "14 enumerated valid combinations" derived from the cartesian
//! product of `{no-T, T, T=}`, `{no-tuple, tuple}`, `{no-stats, stats}`
//! minus three empty combinations and minus `T + SUM` / `T= + RAW`; the
//! seven shapes below times the raw/binned `T` axis (tracked separately
//! as [`TimeDim`]) reproduce exactly that set. Open Question (not named
//! in `spec.md` §9, decided here): the source enumerates 14 named
//! constants rather than a (shape, time-dim) pair; this module keeps the
//! shape/time-dim split since it is operationally identical and far
//! easier to dispatch on, and documents the mapping in `DESIGN.md`.

use hashbrown::{HashMap, HashSet};
use observability_deps::tracing::warn;
use query_types::DbDataValue;
use twox_hash::XxHash64;

use std::hash::{Hash, Hasher};

/// Whether/how `T` was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDim {
    Absent,
    Raw,
    Binned(u64),
}

/// One of the seven documented intermediate-state shapes
/// (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsShape {
    TimeOnly,
    TupleOnly,
    TimeTuple,
    StatsOnly,
    TimeStats,
    TupleStats,
    TupleTimeStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsSelectError {
    /// All three axes empty — nothing to select.
    Empty,
    /// Raw `T` combined with a stats aggregate (`spec.md` §4.4 "T + SUM").
    RawTimeWithStats,
    /// Time-binned `T` combined with a raw tuple projection and no stats
    /// (`spec.md` §4.4 "T= + RAW").
    BinnedTimeWithRawTuple,
}

/// Classifies a flow-series SELECT into its shape, or rejects it per
/// `spec.md` §4.4's exclusion rules (surfaced by `query_parser` as
/// `EINVAL`).
pub fn classify(time_dim: TimeDim, has_tuple: bool, has_stats: bool) -> Result<FsShape, FsSelectError> {
    use TimeDim::*;
    match (time_dim, has_tuple, has_stats) {
        (Absent, false, false) => Err(FsSelectError::Empty),
        (_, false, false) => Ok(FsShape::TimeOnly),
        (Absent, true, false) => Ok(FsShape::TupleOnly),
        (_, true, false) if matches!(time_dim, Binned(_)) => Err(FsSelectError::BinnedTimeWithRawTuple),
        (_, true, false) => Ok(FsShape::TimeTuple),
        (Absent, false, true) => Ok(FsShape::StatsOnly),
        (_, false, true) => Ok(FsShape::TimeStats),
        (Absent, true, true) => Ok(FsShape::TupleStats),
        (Raw, true, true) => Err(FsSelectError::RawTimeWithStats),
        (Binned(_), true, true) => Ok(FsShape::TupleTimeStats),
    }
}

/// One input sample contributed by the WHERE stage's flow-record
/// row-handle cells (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct FlowSample {
    pub t: u64,
    /// Selected flow-tuple fields, in SELECT order, as `(name, value)`.
    pub tuple: Vec<(String, DbDataValue)>,
    pub packets: u64,
    pub bytes: u64,
}

/// The stats aggregate tracked per flow-series group: `sum(packets)`,
/// `sum(bytes)`, and `flow_count` (`spec.md` §4.6, §8 boundary scenario 3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub sum_packets: u64,
    pub sum_bytes: u64,
    pub flow_count: u64,
}

impl FlowStats {
    fn absorb(&mut self, sample: &FlowSample) {
        self.sum_packets += sample.packets;
        self.sum_bytes += sample.bytes;
        self.flow_count += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.sum_packets += other.sum_packets;
        self.sum_bytes += other.sum_bytes;
        self.flow_count += other.flow_count;
    }
}

fn snap(t: u64, time_dim: TimeDim, t_from: u64, t_to: u64) -> Option<u64> {
    if t < t_from || t >= t_to {
        return None;
    }
    match time_dim {
        TimeDim::Absent => Some(0),
        TimeDim::Raw => Some(t),
        TimeDim::Binned(g) if g > 0 => Some(t_from + ((t - t_from) / g) * g),
        TimeDim::Binned(_) => Some(t),
    }
}

fn tuple_key(tuple: &[(String, DbDataValue)]) -> Vec<(String, String)> {
    let mut sorted: Vec<(String, String)> = tuple.iter().map(|(k, v)| (k.clone(), v.to_display_string())).collect();
    sorted.sort();
    sorted
}

/// Stable 64-bit hash of a sorted tuple key-value map, used both as the
/// grouping key for tuple-shaped state and, when `flow_class_id` is
/// selected, as the rendered class id (`spec.md` §4.6).
pub fn hash_tuple(tuple: &[(String, DbDataValue)]) -> u64 {
    let key = tuple_key(tuple);
    let mut hasher = XxHash64::with_seed(0);
    for (k, v) in &key {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    hasher.finish()
}

/// Tracks first-seen tuple per class-id hash, logging (never failing) a
/// collision (`spec.md` §9 Open Question — flow_class_id collisions).
#[derive(Debug, Default)]
pub struct ClassIdRegistry {
    first_seen: HashMap<u64, Vec<(String, String)>>,
}

impl ClassIdRegistry {
    pub fn resolve(&mut self, tuple: &[(String, DbDataValue)]) -> u64 {
        let id = hash_tuple(tuple);
        let key = tuple_key(tuple);
        match self.first_seen.get(&id) {
            None => {
                self.first_seen.insert(id, key);
            }
            Some(existing) if existing != &key => {
                warn!(class_id = id, "flow_class_id hash collision between distinct tuples; keeping first-seen");
            }
            _ => {}
        }
        id
    }
}

/// One emitted flow-series output row.
#[derive(Debug, Clone, Default)]
pub struct FsOutputRow {
    pub t: Option<u64>,
    pub tuple: Vec<(String, DbDataValue)>,
    pub stats: Option<FlowStats>,
    pub flow_class_id: Option<u64>,
}

/// Processes every sample of one chunk into the shape's intermediate
/// state, then emits output rows. `include_class_id` mirrors the SELECT
/// having asked for `flow_class_id`.
pub fn process_chunk(
    shape: FsShape,
    time_dim: TimeDim,
    samples: &[FlowSample],
    t_from: u64,
    t_to: u64,
    include_class_id: bool,
) -> Vec<FsOutputRow> {
    let mut class_ids = ClassIdRegistry::default();
    match shape {
        FsShape::TimeOnly => {
            let mut set: std::collections::BTreeSet<u64> = Default::default();
            for s in samples {
                if let Some(t) = snap(s.t, time_dim, t_from, t_to) {
                    set.insert(t);
                }
            }
            set.into_iter().map(|t| FsOutputRow { t: Some(t), ..Default::default() }).collect()
        }
        FsShape::TupleOnly => {
            let mut seen: HashSet<Vec<(String, String)>> = Default::default();
            let mut rows = Vec::new();
            for s in samples {
                let key = tuple_key(&s.tuple);
                if seen.insert(key) {
                    let class_id = include_class_id.then(|| class_ids.resolve(&s.tuple));
                    rows.push(FsOutputRow {
                        tuple: s.tuple.clone(),
                        stats: Some(FlowStats { flow_count: 1, ..Default::default() }),
                        flow_class_id: class_id,
                        ..Default::default()
                    });
                }
            }
            rows
        }
        FsShape::TimeTuple => {
            let mut map: HashMap<u64, HashSet<Vec<(String, String)>>> = Default::default();
            let mut tuple_values: HashMap<Vec<(String, String)>, Vec<(String, DbDataValue)>> = Default::default();
            for s in samples {
                if let Some(t) = snap(s.t, time_dim, t_from, t_to) {
                    let key = tuple_key(&s.tuple);
                    tuple_values.entry(key.clone()).or_insert_with(|| s.tuple.clone());
                    map.entry(t).or_default().insert(key);
                }
            }
            let mut rows = Vec::new();
            for (t, tuples) in map {
                for key in tuples {
                    rows.push(FsOutputRow { t: Some(t), tuple: tuple_values[&key].clone(), ..Default::default() });
                }
            }
            rows
        }
        FsShape::StatsOnly => {
            let mut stats = FlowStats::default();
            for s in samples {
                if snap(s.t, time_dim, t_from, t_to).is_some() {
                    stats.absorb(s);
                }
            }
            vec![FsOutputRow { stats: Some(stats), ..Default::default() }]
        }
        FsShape::TimeStats => {
            let mut map: HashMap<u64, FlowStats> = Default::default();
            for s in samples {
                if let Some(t) = snap(s.t, time_dim, t_from, t_to) {
                    map.entry(t).or_default().absorb(s);
                }
            }
            let mut rows: Vec<_> =
                map.into_iter().map(|(t, stats)| FsOutputRow { t: Some(t), stats: Some(stats), ..Default::default() }).collect();
            rows.sort_by_key(|r| r.t);
            rows
        }
        FsShape::TupleStats => {
            let mut map: HashMap<Vec<(String, String)>, (Vec<(String, DbDataValue)>, FlowStats)> = Default::default();
            for s in samples {
                if snap(s.t, time_dim, t_from, t_to).is_none() {
                    continue;
                }
                let key = tuple_key(&s.tuple);
                let entry = map.entry(key).or_insert_with(|| (s.tuple.clone(), FlowStats::default()));
                entry.1.absorb(s);
            }
            map.into_iter()
                .map(|(_, (tuple, stats))| {
                    let class_id = include_class_id.then(|| class_ids.resolve(&tuple));
                    FsOutputRow { tuple, stats: Some(stats), flow_class_id: class_id, ..Default::default() }
                })
                .collect()
        }
        FsShape::TupleTimeStats => {
            let mut map: HashMap<(Vec<(String, String)>, u64), (Vec<(String, DbDataValue)>, FlowStats)> = Default::default();
            for s in samples {
                let t = match snap(s.t, time_dim, t_from, t_to) {
                    Some(t) => t,
                    None => continue,
                };
                let key = (tuple_key(&s.tuple), t);
                let entry = map.entry(key).or_insert_with(|| (s.tuple.clone(), FlowStats::default()));
                entry.1.absorb(s);
            }
            map.into_iter()
                .map(|((_, t), (tuple, stats))| FsOutputRow { t: Some(t), tuple, stats: Some(stats), ..Default::default() })
                .collect()
        }
    }
}

/// The 14 valid `(time-dim, has-tuple, has-stats)` combinations this
/// module's `classify` accepts, reproduced from the cartesian product
/// `{none, T, T=} x {no-tuple, tuple} x {no-stats, stats}` minus the
/// excluded combinations (`spec.md` §4.4, `SPEC_FULL.md` §4.8).
pub const CODES: &[(TimeDim, bool, bool)] = &[
    (TimeDim::Absent, false, true),
    (TimeDim::Absent, true, false),
    (TimeDim::Absent, true, true),
    (TimeDim::Raw, false, false),
    (TimeDim::Raw, true, false),
    (TimeDim::Binned(0), false, false),
    (TimeDim::Binned(0), false, true),
    (TimeDim::Binned(0), true, true),
];

/// Merges two chunks' output rows by `(t, tuple key)`, summing their
/// `FlowStats` (`spec.md` §8 boundary scenario 3: two parallel batches'
/// `flow_count=1` rows for the same tuple become `flow_count=2` after
/// `final_merge_processing`). Shapes with no stats (`TimeOnly`,
/// `TupleOnly`, `TimeTuple`) pass through unmerged since the grouping key
/// alone already dedups them; `coordinator` only calls this for the
/// stats-bearing shapes.
pub fn merge_output_rows(rows: Vec<FsOutputRow>) -> Vec<FsOutputRow> {
    let mut by_key: HashMap<(Option<u64>, Vec<(String, String)>), FsOutputRow> = HashMap::new();
    for row in rows {
        let key = (row.t, tuple_key(&row.tuple));
        by_key
            .entry(key)
            .and_modify(|existing| match (existing.stats.as_mut(), row.stats.as_ref()) {
                (Some(stats), Some(new_stats)) => stats.merge(new_stats),
                (None, Some(_)) => existing.stats = row.stats.clone(),
                _ => {}
            })
            .or_insert(row);
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: u64, pkts: u64, bytes: u64) -> FlowSample {
        FlowSample { t, tuple: Vec::new(), packets: pkts, bytes }
    }

    #[test]
    fn classify_rejects_empty_selection() {
        assert_eq!(classify(TimeDim::Absent, false, false), Err(FsSelectError::Empty));
    }

    #[test]
    fn classify_rejects_raw_time_with_stats() {
        assert_eq!(classify(TimeDim::Raw, false, true), Err(FsSelectError::RawTimeWithStats));
    }

    #[test]
    fn classify_rejects_binned_time_with_raw_tuple() {
        assert_eq!(classify(TimeDim::Binned(7), true, false), Err(FsSelectError::BinnedTimeWithRawTuple));
    }

    #[test]
    fn time_binned_sum_matches_boundary_scenario_2() {
        // spec.md §8 scenario 2: T0..T0+55s at 5s steps, G=7s, pkts=1 bytes=50 each.
        let t0 = 0u64;
        let samples: Vec<FlowSample> = (0..12).map(|i| sample(t0 + i * 5_000_000, 1, 50)).collect();
        let rows = process_chunk(FsShape::TimeStats, TimeDim::Binned(7_000_000), &samples, t0, t0 + 60_000_000, false);
        let total_packets: u64 = rows.iter().map(|r| r.stats.unwrap().sum_packets).sum();
        assert_eq!(total_packets, 12);
        for r in &rows {
            assert_eq!(r.t.unwrap() % 7_000_000, 0);
        }
    }

    #[test]
    fn samples_outside_range_are_discarded() {
        let samples = vec![sample(1000, 1, 1), sample(5_000_000, 1, 1)];
        let rows = process_chunk(FsShape::TimeOnly, TimeDim::Raw, &samples, 0, 1_000_000, false);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn class_id_registry_logs_but_keeps_first_seen_on_collision() {
        let mut registry = ClassIdRegistry::default();
        let tuple_a = vec![("svn".to_string(), DbDataValue::U64(1))];
        let id_a = registry.resolve(&tuple_a);
        let id_a_again = registry.resolve(&tuple_a);
        assert_eq!(id_a, id_a_again);
    }

    #[test]
    fn merge_output_rows_sums_flow_count_across_chunks_matches_scenario_3() {
        let tuple = vec![("svn".to_string(), DbDataValue::U64(1)), ("dvn".to_string(), DbDataValue::U64(2))];
        let chunk_a = vec![FsOutputRow { tuple: tuple.clone(), stats: Some(FlowStats { flow_count: 1, ..Default::default() }), ..Default::default() }];
        let chunk_b = vec![FsOutputRow { tuple: tuple.clone(), stats: Some(FlowStats { flow_count: 1, ..Default::default() }), ..Default::default() }];
        let merged = merge_output_rows([chunk_a, chunk_b].concat());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].stats.unwrap().flow_count, 2);
    }
}
