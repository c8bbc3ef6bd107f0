//! A `tracing_subscriber::Layer` that writes events as logfmt
//! (`key=value`) lines, one per event, to a writer.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]

use std::fmt::Write as _;
use std::io::Write as IoWrite;
use std::sync::Mutex;

use tracing_subscriber::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Writes one logfmt line per event: `level=INFO target=foo msg="bar" key=val`.
pub struct LogFmtLayer<W> {
    writer: Mutex<W>,
}

impl<W> LogFmtLayer<W>
where
    W: IoWrite + Send + Sync + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

struct FieldCollector(String);

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, " msg=\"{:?}\"", value);
        } else {
            let _ = write!(self.0, " {}=\"{:?}\"", field.name(), value);
        }
    }
}

impl<S, W> Layer<S> for LogFmtLayer<W>
where
    S: tracing::Subscriber,
    W: IoWrite + Send + Sync + 'static,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut line = format!("level={} target={}", meta.level(), meta.target());
        let mut collector = FieldCollector(String::new());
        event.record(&mut collector);
        line.push_str(&collector.0);
        line.push('\n');
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.write_all(line.as_bytes());
        }
    }
}
