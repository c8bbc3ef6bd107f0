//! Result bus client (C2, `spec.md` §4.2): `K+1` connections to the
//! front-end queue/result store, one dedicated to blocking intake of new
//! query ids, the rest carrying per-query reads, progress heartbeats, and
//! result-row writes.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod bus;
mod connection;
mod frames;

pub use bus::{Bus, BusError, QUERYQ, RESULT_BATCH_BYTES};
pub use connection::{BusConnection, ConnectionState, RECONNECT_INTERVAL};
pub use frames::ProgressFrame;
