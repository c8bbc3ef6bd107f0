//! Flags controlling row-key partitioning and chunking in `storage_engine`.

#[derive(Debug, Clone, clap::Parser)]
pub struct StorageConfig {
    /// Backing column-family store address.
    #[clap(long = "storage-address", env = "QE_STORAGE_ADDRESS", default_value = "127.0.0.1:9042")]
    pub address: String,

    /// Minimum row-key partition, inclusive.
    #[clap(long = "partition-min", env = "QE_PARTITION_MIN", default_value = "0")]
    pub partition_min: u8,

    /// Maximum row-key partition, inclusive.
    #[clap(long = "partition-max", env = "QE_PARTITION_MAX", default_value = "15")]
    pub partition_max: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_cover_sixteen_way_partitioning() {
        let config = StorageConfig::parse_from(["qed"]);
        assert_eq!(config.partition_min, 0);
        assert_eq!(config.partition_max, 15);
    }
}
