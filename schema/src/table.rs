//! Table families and their TTL buckets (`spec.md` §3, §4.4).

use std::time::Duration;

/// The table families the coordinator understands. `spec.md` names these
/// tables throughout §3/§4/§6; `ObjectValue` (the non-parallelizable
/// object-summary lookup) is named in §4.4's parallelization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFamily {
    Messages,
    FlowRecords,
    FlowSeries,
    SessionRecords,
    ObjectLog,
    ObjectValue,
    Stats,
}

impl TableFamily {
    /// Maps a `table` field value to a family. Unknown names clamp to
    /// `Messages`, matching `spec.md` §6 ("clamped to a known table
    /// name").
    pub fn from_table_name(name: &str) -> Self {
        match name {
            "FlowRecordTable" => Self::FlowRecords,
            "FlowSeriesTable" => Self::FlowSeries,
            "SessionTable" | "SessionRecordTable" => Self::SessionRecords,
            "ObjectValueTable" => Self::ObjectValue,
            n if n.starts_with("ObjectTable") || n.starts_with("ObjectLog") => Self::ObjectLog,
            n if n.starts_with("Stats") || n.starts_with("Stat") => Self::Stats,
            _ => Self::Messages,
        }
    }

    /// The TTL bucket governing this family's retention clamp.
    pub fn ttl_bucket(self) -> TtlBucket {
        match self {
            Self::Messages | Self::ObjectLog | Self::ObjectValue => TtlBucket::Global,
            Self::FlowRecords | Self::FlowSeries => TtlBucket::FlowData,
            Self::Stats => TtlBucket::StatsData,
            Self::SessionRecords => TtlBucket::ConfigAudit,
        }
    }

    /// Whether this family can be split into time-sliced chunks.
    /// `spec.md` §4.4: "Parallelize unless table = object-value."
    pub fn is_parallelizable(self) -> bool {
        !matches!(self, Self::ObjectValue)
    }

    /// The by-UUID column family `select_exec`'s per-UUID fetch family
    /// reads from (`spec.md` §4.6). `FlowSeries`/`Stats`/`SessionRecords`
    /// never drive a by-UUID fetch: flow-series renders through the
    /// flow-series matrix, stats through `StatsSelect`, and session
    /// records map onto flow-style rows rather than a UUID lookup
    /// (`spec.md` GLOSSARY "Session table vs. flow table").
    pub fn uuid_cf_name(self) -> Option<&'static str> {
        match self {
            Self::Messages => Some("MessageTableMessageUUID"),
            Self::FlowRecords => Some("FlowRecordTableUUID"),
            Self::ObjectLog => Some("ObjectTableObjectUUID"),
            Self::ObjectValue | Self::FlowSeries | Self::Stats | Self::SessionRecords => None,
        }
    }

    /// Whether this family implies `merge_needed = true` unconditionally.
    /// `spec.md` §4.4: "Flow-table ... imply `merge_needed = true`."
    /// (flow-series-with-stats is decided by the SELECT shape, handled in
    /// `query_parser`.)
    pub fn always_needs_merge(self) -> bool {
        matches!(self, Self::FlowRecords)
    }
}

/// Retention buckets named in `spec.md` §4.4 "TTL clamp".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlBucket {
    Global,
    FlowData,
    StatsData,
    ConfigAudit,
}

impl TtlBucket {
    /// Default TTL duration for this bucket. These are operator-tunable
    /// in the original system's configuration; the coordinator exposes
    /// them via `clap_blocks::CoordinatorConfig` and falls back to these
    /// defaults.
    pub fn default_duration(self) -> Duration {
        match self {
            Self::Global => Duration::from_secs(24 * 3600),
            Self::FlowData => Duration::from_secs(2 * 3600),
            Self::StatsData => Duration::from_secs(3600),
            Self::ConfigAudit => Duration::from_secs(7 * 24 * 3600),
        }
    }
}
