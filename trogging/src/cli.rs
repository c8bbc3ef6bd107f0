//! `LoggingConfig`: the `clap` block every `qed` run-mode flattens in,
//! matching the teacher's `influxdb_iox` command surface.

use std::io;

use crate::{Builder, LogFormat};

#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Logs: filter directive, e.g. `info,coordinator=debug`.
    #[clap(
        long = "--log-filter",
        env = "LOG_FILTER",
        default_value = "info",
        action
    )]
    pub log_filter: String,

    /// Logs: output format.
    #[clap(
        long = "--log-format",
        env = "LOG_FORMAT",
        default_value = "logfmt",
        action
    )]
    pub log_format: LogFormat,
}

impl LoggingConfig {
    pub fn to_builder(&self) -> Builder {
        Builder::new().with_filter(&self.log_filter).with_format(self.log_format)
    }

    /// Installs the global subscriber. Returns a guard that must be held
    /// for the process lifetime (matching `tracing_subscriber`'s
    /// non-blocking writer guard pattern used throughout the teacher).
    pub fn init(&self) -> Result<(), io::Error> {
        self.to_builder().install_global()
    }
}
