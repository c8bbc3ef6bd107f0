//! WHERE match-term compiler and filter OR-of-ANDs evaluator
//! (`spec.md` §4.4 "WHERE", §4.7 "Filter").
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod filter;
mod term;
mod validate;

pub use filter::{evaluate_filter, FilterTerm};
pub use term::{parse_where, MatchTerm, Op, WhereParseError, WhereTree};
pub use validate::{validate_cross_field, validate_object_id, CrossFieldError};
