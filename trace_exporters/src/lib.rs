//! Span exporters that run outside the request path: a bounded channel
//! feeds a background task which batches spans out to a collector.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod cli;
pub mod export;
pub mod jaeger;

use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("error resolving jaeger agent address {address}"))]
    Resolution { address: String },

    #[snafu(display("io error talking to jaeger agent: {source}"))]
    Io { source: std::io::Error },
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
