//! SELECT executor (`spec.md` §4.6): given the WHERE stage's matched
//! rows for one chunk, materializes output rows via one of three
//! families — per-UUID fetch, the flow-series matrix, or `StatsSelect`
//! streaming aggregation. `coordinator` picks the family per
//! `query_parser`'s classification of the query's table and SELECT.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod fetch;
mod fsselect;
pub mod object;
mod stats;

pub use fetch::{distinct_uuids, fetch_by_uuid, fetch_object_log_rows, fetch_rows, FetchError, SandeshType};
pub use fsselect::{classify, hash_tuple, merge_output_rows, process_chunk, ClassIdRegistry, FlowSample, FlowStats, FsOutputRow, FsSelectError, FsShape, TimeDim, CODES};
pub use stats::{merge_final, process_row, render_row, AggCell, StatToken, StatsAccumulator};
