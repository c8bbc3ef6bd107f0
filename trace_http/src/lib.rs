//! Tower middleware that attaches a [`trace::SpanContext`] to each inbound
//! request and records RED metrics for the query engine's HTTP front end.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod tower;

pub use crate::tower::{TraceLayer, TraceService};
