//! Minimal distributed-tracing context: a `SpanContext` carried alongside
//! each query through the coordinator → pipeline → bus-write path, and a
//! `TraceCollector` trait span events are reported to
//! (`SPEC_FULL.md` §4.0 "Logging & tracing").
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

/// 128-bit trace id, 64-bit span id — wide enough to avoid collisions
/// across a long-lived coordinator process without pulling in a full
/// OpenTelemetry SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId(pub u128);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanId(pub u64);

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A span within a trace, tagged with the query-id it belongs to.
#[derive(Debug, Clone)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub qid: Option<String>,
    pub start_unix_nanos: u128,
    pub end_unix_nanos: Option<u128>,
}

impl Span {
    pub fn end(&mut self) {
        self.end_unix_nanos = Some(now_nanos());
    }
}

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}

/// Receives completed spans. `coordinator` reports one span per pipeline
/// stage instance; `trace_exporters` implements this for Jaeger.
pub trait TraceCollector: std::fmt::Debug + Send + Sync {
    fn export(&self, span: Span);
}

/// A no-op collector, the default when no exporter is configured.
#[derive(Debug, Default)]
pub struct NoopTraceCollector;

impl TraceCollector for NoopTraceCollector {
    fn export(&self, _span: Span) {}
}

/// Creates the root span context for a newly admitted query.
#[derive(Debug, Clone)]
pub struct SpanContext {
    pub trace_id: TraceId,
    collector: Option<Arc<dyn TraceCollector>>,
}

impl SpanContext {
    pub fn new(collector: Option<Arc<dyn TraceCollector>>) -> Self {
        Self { trace_id: TraceId(rand::thread_rng().next_u64() as u128), collector }
    }

    /// Starts a new child span under this context's trace.
    pub fn child(&self, name: impl Into<String>, qid: Option<String>) -> SpanGuard {
        let span = Span {
            trace_id: self.trace_id,
            span_id: SpanId(rand::thread_rng().next_u64()),
            parent_span_id: None,
            name: name.into(),
            qid,
            start_unix_nanos: now_nanos(),
            end_unix_nanos: None,
        };
        SpanGuard { span: Some(span), collector: self.collector.clone() }
    }
}

/// Ends and reports its span on drop, so a stage instance's span always
/// closes even on an early `?` return.
#[derive(Debug)]
pub struct SpanGuard {
    span: Option<Span>,
    collector: Option<Arc<dyn TraceCollector>>,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
            if let Some(collector) = &self.collector {
                collector.export(span);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingCollector {
        spans: Mutex<Vec<Span>>,
    }

    impl TraceCollector for RecordingCollector {
        fn export(&self, span: Span) {
            self.spans.lock().unwrap().push(span);
        }
    }

    #[test]
    fn span_guard_reports_on_drop() {
        let collector = Arc::new(RecordingCollector::default());
        let ctx = SpanContext::new(Some(collector.clone() as Arc<dyn TraceCollector>));
        {
            let _guard = ctx.child("where-exec", Some("q1".to_string()));
        }
        let spans = collector.spans.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].qid.as_deref(), Some("q1"));
        assert!(spans[0].end_unix_nanos.is_some());
    }
}
