//! Post-processor & merger (`spec.md` §4.7): filter, multi-key typed
//! sort, limit, and the two merge entry points used to fold per-chunk
//! SELECT output into the query's running and final result.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod filter;
mod limit;
mod merge;
mod sort;

pub use filter::{filter_json_rows, filter_rows, AutoFilterConfig};
pub use limit::apply_limit;
pub use merge::{final_merge_processing_rows, final_merge_processing_stats, merge_processing_rows, merge_processing_stats};
pub use sort::{compare_json_rows, compare_rows, sort_json_rows, sort_rows, SortDirection, SortField};
