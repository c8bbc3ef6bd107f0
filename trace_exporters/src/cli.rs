//! `clap` configuration block for wiring up the Jaeger exporter from the
//! `qed` binary's command line and environment.

use std::sync::Arc;

use observability_deps::tracing::warn;
use trace::TraceCollector;

use crate::export::{AsyncExporter, collector};
use crate::jaeger::{JaegerAgentExporter, JaegerTag};

#[derive(Debug, clap::Parser)]
pub struct TracingConfig {
    /// Name this process reports itself as to the tracing backend.
    #[clap(long = "trace-service-name", env = "TRACE_SERVICE_NAME", default_value = "qe-coordinator")]
    pub service_name: String,

    /// `host:port` of a local Jaeger agent. When unset, tracing is a no-op.
    #[clap(long = "trace-jaeger-agent", env = "TRACE_JAEGER_AGENT")]
    pub jaeger_agent: Option<String>,

    /// Static `key=value` tags applied to every exported span.
    #[clap(long = "trace-jaeger-tag", env = "TRACE_JAEGER_TAGS", value_delimiter = ',')]
    pub jaeger_tags: Vec<JaegerTag>,

    /// Bounded channel size between request threads and the exporter task.
    #[clap(long = "trace-jaeger-buffer", env = "TRACE_JAEGER_BUFFER", default_value = "1024")]
    pub buffer: usize,

    /// Max spans batched into a single UDP packet.
    #[clap(long = "trace-jaeger-batch-size", env = "TRACE_JAEGER_BATCH_SIZE", default_value = "32")]
    pub batch_size: usize,
}

impl TracingConfig {
    /// Builds the configured collector, or `None` if no agent was
    /// configured.
    pub fn build(&self) -> Option<Arc<dyn TraceCollector>> {
        let agent = self.jaeger_agent.as_ref()?;
        match JaegerAgentExporter::new(self.service_name.clone(), agent.clone()) {
            Ok(exporter) => {
                let exporter = exporter.with_tags(&self.jaeger_tags);
                Some(collector(AsyncExporter::new(exporter, self.buffer, self.batch_size)))
            }
            Err(e) => {
                warn!(%e, %agent, "failed to initialize jaeger exporter, tracing disabled");
                None
            }
        }
    }
}
