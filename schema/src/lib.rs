//! Column-family and table schema: datatypes, column-family descriptors,
//! table families, TTL buckets, and StatsOracle dynamic-table schema.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod cf;
mod datatype;
mod stats;
mod table;

pub use cf::{ColumnDef, ColumnFamilyDescriptor, ColumnNameRange};
pub use datatype::Datatype;
pub use stats::{stat_tag_cf_name, DynamicStatsSchema, StatColumnSchema, StatTagPrefix, StatTagSuffix};
pub use table::{TableFamily, TtlBucket};

/// Field names synthesized into a StatsSelect row's unique-columns map
/// when the corresponding SELECT token is present (`spec.md` §4.6).
pub const STAT_UUID_FIELD: &str = "UuidKey";
pub const STAT_TIME_FIELD: &str = "T";
pub const STAT_TIMEBIN_FIELD: &str = "TIME_BIN";
