//! Job-server proxy (C3, `spec.md` §4.3): owns the mapping from query id
//! to in-flight pipeline, reads the admitted query's JSON parameters,
//! plans and wires the two-stage [`work_pipeline`], and reports
//! completion back to the result bus.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod handler;
mod pipeline;
mod rows;
pub mod slots;

pub use handler::handle_query;
pub use slots::PipelineSlots;
