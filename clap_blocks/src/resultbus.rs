//! Flags controlling the connection pool used to talk to the result bus.

use std::time::Duration;

#[derive(Debug, Clone, clap::Parser)]
pub struct ResultBusConfig {
    /// Result bus (Redis) address, e.g. `127.0.0.1:6379`.
    #[clap(long = "resultbus-address", env = "QE_RESULTBUS_ADDRESS", default_value = "127.0.0.1:6379")]
    pub address: String,

    /// Worker connections used to pull completed-row batches, in addition
    /// to the dedicated intake connection.
    #[clap(long = "resultbus-connections", env = "QE_RESULTBUS_CONNECTIONS", default_value = "4")]
    pub connections: u32,

    /// TTL applied to a query's result-bus keys after its pipeline
    /// finishes.
    #[clap(long = "resultbus-result-ttl", env = "QE_RESULTBUS_RESULT_TTL", default_value = "5m", value_parser = humantime::parse_duration)]
    pub result_ttl: Duration,
}
