//! Bridges the synchronous [`trace::TraceCollector`] callback invoked on
//! request-processing threads to an async batch exporter running on its own
//! task, so a slow or blocked collector backend can never stall a query.

use std::sync::Arc;

use async_trait::async_trait;
use observability_deps::tracing::warn;
use tokio::sync::mpsc;

use trace::{Span, TraceCollector};

/// Implemented by exporters that ship completed spans somewhere (a Jaeger
/// agent, a log file, a test double).
#[async_trait]
pub trait AsyncExport: Send + 'static {
    async fn export(&mut self, spans: Vec<Span>);
}

/// Collects spans from request-processing threads onto a bounded channel,
/// and drains them in batches on a dedicated tokio task.
#[derive(Debug)]
pub struct AsyncExporter {
    sender: mpsc::Sender<Span>,
}

impl AsyncExporter {
    /// Spawns the background drain task. `buffer` bounds the channel;
    /// spans are dropped (with a warning) if the exporter falls behind.
    pub fn new<T: AsyncExport>(mut exporter: T, buffer: usize, batch_size: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(buffer);
        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            while let Some(span) = receiver.recv().await {
                batch.push(span);
                while batch.len() < batch_size {
                    match receiver.try_recv() {
                        Ok(span) => batch.push(span),
                        Err(_) => break,
                    }
                }
                exporter.export(std::mem::take(&mut batch)).await;
            }
        });
        Self { sender }
    }
}

impl TraceCollector for AsyncExporter {
    fn export(&self, span: Span) {
        if self.sender.try_send(span).is_err() {
            warn!("trace exporter channel full, dropping span");
        }
    }
}

/// Wraps an `AsyncExporter` so it can be handed out as `Arc<dyn
/// TraceCollector>` alongside typed access for tests.
pub fn collector(exporter: AsyncExporter) -> Arc<dyn TraceCollector> {
    Arc::new(exporter)
}
