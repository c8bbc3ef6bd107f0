//! Reusable `clap::Args` blocks shared by `qed`'s run command: the knobs
//! from this system's work-pipeline, result-bus, and storage layers,
//! gathered here the way the teacher's binary gathers per-service config.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod coordinator;
pub mod resultbus;
pub mod storage;

pub use crate::coordinator::CoordinatorConfig;
pub use crate::resultbus::ResultBusConfig;
pub use crate::storage::StorageConfig;
