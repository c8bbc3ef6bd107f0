//! `qed`: the query engine daemon. Parses the coordinator/result-bus/
//! storage CLI blocks (`clap_blocks`), wires `resultbus::Bus` to
//! `coordinator`'s admission handler, and serves a Prometheus endpoint
//! alongside the intake loop.
//!
//! This binary collapses the teacher's router/ingester/querier/compactor
//! run-mode split into one logical service: `spec.md` names a single
//! coordinator process with no comparable topology.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use clap_blocks::{CoordinatorConfig, ResultBusConfig, StorageConfig};
use coordinator::PipelineSlots;
use observability_deps::tracing::{error, info};
use panic_logging::SendPanicsToTracing;
use qe_time::SystemProvider;
use query_parser::ParserConfig;
use resultbus::Bus;
use storage_engine::InMemoryEngine;
use trogging::cli::LoggingConfig;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("invalid --bind-address {0:?}: {1}")]
    BindAddress(String, std::net::AddrParseError),
    #[error("failed to install logging subscriber: {0}")]
    Logging(#[from] std::io::Error),
}

#[derive(Debug, clap::Parser)]
#[clap(name = "qed", about = "Distributed analytics query engine coordinator")]
struct Config {
    #[clap(flatten)]
    logging: LoggingConfig,

    #[clap(flatten)]
    coordinator: CoordinatorConfig,

    #[clap(flatten)]
    resultbus: ResultBusConfig,

    #[clap(flatten)]
    storage: StorageConfig,

    /// Identifies this process's backup list, `ENGINE:<engine-id>`
    /// (`spec.md` §6). Typically the pod/host name.
    #[clap(long = "engine-id", env = "QE_ENGINE_ID", default_value = "localhost")]
    engine_id: String,
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    config.logging.init()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get())
        .build()
        .expect("failed to build tokio runtime");

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Error> {
    let registry = Arc::new(metric::Registry::new());
    let _panic_guard = SendPanicsToTracing::new(&registry);

    let bind_address: SocketAddr = config
        .coordinator
        .bind_address
        .parse()
        .map_err(|e| Error::BindAddress(config.coordinator.bind_address.clone(), e))?;

    info!(
        max_tasks = config.coordinator.max_tasks,
        max_inflight_pipelines = config.coordinator.max_inflight_pipelines,
        resultbus_address = %config.resultbus.address,
        resultbus_connections = config.resultbus.connections,
        %bind_address,
        "starting qed"
    );

    let bus = Bus::new(&config.resultbus.address, config.resultbus.connections, config.resultbus.result_ttl, &config.engine_id);
    bus.spawn_connections();

    let engine = Arc::new(InMemoryEngine::new());
    let time_provider = Arc::new(SystemProvider::new());

    let inflight_gauge = registry.register_gauge("inflight_pipelines", "in-flight query pipelines");
    let slots = Arc::new(PipelineSlots::new(config.coordinator.max_inflight_pipelines, &inflight_gauge));

    let parser_config = ParserConfig { parallel_batches: config.coordinator.max_tasks as u64, max_slice: config.coordinator.max_slice };

    let metrics_registry = Arc::clone(&registry);
    tokio::spawn(async move {
        if let Err(err) = metric_exporters::serve(bind_address, metrics_registry).await {
            error!(%err, "metrics endpoint exited");
        }
    });

    info!("waiting for result-bus connections");
    bus.wait_all_connected().await;
    info!("all result-bus connections up, starting intake loop");

    let max_tasks = config.coordinator.max_tasks;
    let max_rows = config.coordinator.max_rows;
    loop {
        let qid = bus.pop_query_id().await;
        let bus = Arc::clone(&bus);
        let engine: Arc<dyn storage_engine::StorageEngine> = Arc::clone(&engine) as _;
        let slots = Arc::clone(&slots);
        let time_provider: Arc<dyn qe_time::TimeProvider> = Arc::clone(&time_provider) as _;
        let parser_config = parser_config.clone();
        tokio::spawn(async move {
            coordinator::handle_query(qid, bus, engine, slots, time_provider, parser_config, max_tasks, max_rows).await;
        });
    }
}
