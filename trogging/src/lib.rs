//! Logging pipeline built on `tracing-subscriber`, wired the way the
//! teacher's `trogging` crate wires IOx's: a filter directive, a choice
//! of output format, and a `clap::Parser` block for CLI/env
//! configuration (`SPEC_FULL.md` §2 ambient-stack table).
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]

#[cfg(feature = "clap")]
pub mod cli;

use std::fmt;
use std::io;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Logfmt,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logfmt" => Ok(Self::Logfmt),
            "json" => Ok(Self::Json),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logfmt => write!(f, "logfmt"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown log format: {0}")]
    UnknownFormat(String),

    #[error("failed to install global subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Builds a global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct Builder {
    filter: String,
    format: LogFormat,
}

impl Default for Builder {
    fn default() -> Self {
        Self { filter: "info".to_string(), format: LogFormat::Logfmt }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Installs this configuration as the process-wide default
    /// subscriber, writing to stdout.
    pub fn install_global(&self) -> Result<(), io::Error> {
        let env_filter = EnvFilter::try_new(&self.filter)
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match self.format {
            LogFormat::Logfmt => {
                let layer = logfmt::LogFmtLayer::new(io::stdout());
                tracing::subscriber::set_global_default(registry.with(layer))
            }
            LogFormat::Json => {
                let layer = tracing_subscriber::fmt::layer().json();
                tracing::subscriber::set_global_default(registry.with(layer))
            }
        };
        result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
