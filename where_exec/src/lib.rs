//! WHERE executor (`spec.md` §4.5): compiles a `predicate::WhereTree`
//! into column-family scan units, fetches them through the storage
//! engine, and combines the results with sorted set-algebra.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod compile;
mod exec;
mod setops;
mod unit;

pub use compile::{compile_and_group, compile_where, empty_where_unit, is_range_term};
pub use exec::execute_where;
pub use setops::{dedup_flow_by_uuid, intersect, intersect_all, union, union_all};
pub use unit::{fetch_unit, DbQueryUnit, UnitRowKey};
