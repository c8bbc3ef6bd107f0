//! Flags controlling how a query is split into stage-0 tasks and how many
//! pipelines the coordinator will run at once.

#[derive(Debug, Clone, clap::Parser)]
pub struct CoordinatorConfig {
    /// Parallel stage-0 task instances to plan per query, absent an
    /// explicit per-query override.
    #[clap(long = "max-tasks", env = "QE_MAX_TASKS", default_value = "4")]
    pub max_tasks: u32,

    /// Upper bound, as a multiple of the minimum chunk size, on how large
    /// a single chunk may grow when a query's time range is wide.
    #[clap(long = "max-slice", env = "QE_MAX_SLICE", default_value = "100")]
    pub max_slice: u64,

    /// Maximum number of query pipelines running concurrently across the
    /// whole process.
    #[clap(long = "max-inflight-pipelines", env = "QE_MAX_INFLIGHT_PIPELINES", default_value = "32")]
    pub max_inflight_pipelines: usize,

    /// HTTP bind address for the query admission + metrics endpoint.
    #[clap(long = "bind-address", env = "QE_BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    pub bind_address: String,

    /// Per-query row cap: once a query's merged row total exceeds this,
    /// the pipeline aborts with `-ENOBUFS` instead of writing rows.
    #[clap(long = "max-rows", env = "QE_MAX_ROWS", default_value = "1000000")]
    pub max_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_documented_values() {
        let config = CoordinatorConfig::parse_from(["qed"]);
        assert_eq!(config.max_tasks, 4);
        assert_eq!(config.max_slice, 100);
        assert_eq!(config.max_inflight_pipelines, 32);
        assert_eq!(config.max_rows, 1_000_000);
    }
}
