//! Ships spans to a local Jaeger agent as newline-delimited JSON over UDP.
//!
//! The real Jaeger agent speaks Thrift compact protocol over UDP; this
//! exporter instead targets a small sidecar (or a test harness) that accepts
//! the same JSON span shape emitted by [`trace::Span`], avoiding a
//! hand-maintained copy of Jaeger's generated Thrift IDL bindings.

use std::net::{ToSocketAddrs, UdpSocket};
use std::str::FromStr;

use async_trait::async_trait;
use observability_deps::tracing::*;
use serde::Serialize;

use crate::export::AsyncExport;
use crate::{Error, Result};
use trace::Span;

/// A key=value pair for span annotations.
#[derive(Debug, Clone, Serialize)]
pub struct JaegerTag {
    key: String,
    value: String,
}

impl JaegerTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

impl FromStr for JaegerTag {
    type Err = Box<dyn std::error::Error + Send + Sync + 'static>;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s.split('=').collect::<Vec<_>>();
        match *parts {
            [key, value] if !key.is_empty() && !value.is_empty() => Ok(Self::new(key, value)),
            _ => Err(format!("invalid key=value pair ({s})").into()),
        }
    }
}

#[derive(Serialize)]
struct WireSpan<'a> {
    trace_id: String,
    span_id: String,
    parent_span_id: Option<String>,
    name: &'a str,
    qid: Option<&'a str>,
    start_unix_nanos: u128,
    end_unix_nanos: Option<u128>,
}

#[derive(Serialize)]
struct Batch<'a> {
    service_name: &'a str,
    tags: &'a [JaegerTag],
    seq_no: i64,
    spans: Vec<WireSpan<'a>>,
}

/// Receives span data and writes it over UDP to a local jaeger agent.
///
/// Note: drops a batch if the UDP socket would block, matching the
/// best-effort delivery semantics of the real agent protocol.
pub struct JaegerAgentExporter {
    service_name: String,
    socket: UdpSocket,
    next_sequence: i64,
    tags: Vec<JaegerTag>,
}

impl JaegerAgentExporter {
    pub fn new<E: ToSocketAddrs + std::fmt::Display>(service_name: String, agent_endpoint: E) -> Result<Self> {
        info!(%agent_endpoint, %service_name, "creating jaeger tracing exporter");
        let remote_addr = agent_endpoint
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Resolution { address: agent_endpoint.to_string() })?;

        let local_addr = if remote_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local_addr)?;
        socket.set_nonblocking(true)?;
        socket.connect(remote_addr)?;

        Ok(Self { service_name, socket, next_sequence: 0, tags: vec![] })
    }

    /// Annotate all spans emitted by this exporter with the specified static
    /// tags.
    pub fn with_tags(mut self, tags: &[JaegerTag]) -> Self {
        debug!(?tags, "setting static jaeger span tags");
        self.tags = tags.to_vec();
        self
    }

    fn make_batch<'a>(&mut self, spans: &'a [Span]) -> Batch<'a> {
        let seq_no = self.next_sequence;
        self.next_sequence += 1;
        Batch {
            service_name: &self.service_name,
            tags: &self.tags,
            seq_no,
            spans: spans
                .iter()
                .map(|s| WireSpan {
                    trace_id: s.trace_id.to_string(),
                    span_id: s.span_id.to_string(),
                    parent_span_id: s.parent_span_id.map(|id| id.to_string()),
                    name: &s.name,
                    qid: s.qid.as_deref(),
                    start_unix_nanos: s.start_unix_nanos,
                    end_unix_nanos: s.end_unix_nanos,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl AsyncExport for JaegerAgentExporter {
    async fn export(&mut self, spans: Vec<Span>) {
        let batch = self.make_batch(&spans);
        let payload = match serde_json::to_vec(&batch) {
            Ok(p) => p,
            Err(e) => {
                error!(%e, "error encoding span batch");
                return;
            }
        };
        match self.socket.send(&payload) {
            Ok(written) if written != payload.len() => {
                error!(%written, len = payload.len(), "jaeger agent exporter truncated UDP packet");
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                warn!("jaeger agent exporter would have blocked, dropping batch");
            }
            Err(e) => error!(%e, "error writing batch to jaeger agent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaeger_tag_from_str() {
        "".parse::<JaegerTag>().expect_err("empty tag should fail");
        "key".parse::<JaegerTag>().expect_err("no value should fail");
        "key=value".parse::<JaegerTag>().expect("valid form should succeed");
    }

    #[tokio::test]
    async fn sends_batch_to_local_socket() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(std::time::Duration::from_secs(1))).unwrap();
        let address = server.local_addr().unwrap();

        let tags = [JaegerTag::new("region", "us-east")];
        let mut exporter = JaegerAgentExporter::new("qe-coordinator".to_string(), address)
            .unwrap()
            .with_tags(&tags);

        let ctx = trace::SpanContext::new(None);
        let mut spans = vec![];
        {
            let _guard = ctx.child("where-exec", Some("q1".to_string()));
        }
        // SpanGuard reports on drop via a collector; here we just build one
        // directly to exercise the wire encoding without a channel hop.
        spans.push(trace::Span {
            trace_id: ctx.trace_id,
            span_id: trace::SpanId(1),
            parent_span_id: None,
            name: "where-exec".to_string(),
            qid: Some("q1".to_string()),
            start_unix_nanos: 100,
            end_unix_nanos: Some(300),
        });

        exporter.export(spans).await;

        let mut buf = [0u8; 4096];
        let n = server.recv(&mut buf).unwrap();
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.contains("qe-coordinator"));
        assert!(text.contains("where-exec"));
        assert!(text.contains("region"));
    }
}
