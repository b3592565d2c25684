//! Experiment configuration.

use blocksync_net::NetworkProfile;
use blocksync_node::{ProtocolConfig, SyncMode};
use std::time::Duration;

/// Configuration for one experiment run.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Total nodes N (node 0 is the lagging requester).
    pub num_nodes: u32,
    /// Maximum tolerated faulty peers f.
    pub max_faulty: u32,
    /// Data shards K; defaults to N − f.
    pub data_shards: Option<u32>,
    /// Recovery strategy under test.
    pub mode: SyncMode,
    /// How many consecutive blocks the requester is missing.
    pub missing_blocks: u32,
    /// Transactions per block (drives the block size).
    pub txns_per_block: usize,
    /// Which peers are Byzantine-silent; `None` picks the first f peers.
    pub faulty_peers: Option<Vec<u32>>,
    /// Simulated link conditions.
    pub network: NetworkProfile,
    /// Per-request read deadline.
    pub read_deadline: Duration,
    /// First TCP port of the cluster.
    pub base_port: u16,
    /// Seed for requester-side randomness.
    pub seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_nodes: 10,
            max_faulty: 3,
            data_shards: None,
            mode: SyncMode::Rs,
            missing_blocks: 1,
            txns_per_block: 1000,
            faulty_peers: None,
            network: NetworkProfile::UNLIMITED,
            read_deadline: Duration::from_secs(20),
            base_port: 8000,
            seed: 42,
        }
    }
}

impl ExperimentConfig {
    pub fn new(num_nodes: u32, max_faulty: u32) -> Self {
        Self {
            num_nodes,
            max_faulty,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_missing_blocks(mut self, blocks: u32) -> Self {
        self.missing_blocks = blocks;
        self
    }

    pub fn with_txns_per_block(mut self, txns: usize) -> Self {
        self.txns_per_block = txns;
        self
    }

    pub fn with_faulty_peers(mut self, peers: Vec<u32>) -> Self {
        self.faulty_peers = Some(peers);
        self
    }

    pub fn with_network(mut self, network: NetworkProfile) -> Self {
        self.network = network;
        self
    }

    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Effective K: configured, or N − f.
    pub fn data_shards(&self) -> u32 {
        self.data_shards
            .unwrap_or_else(|| self.num_nodes.saturating_sub(self.max_faulty).max(1))
    }

    /// The Byzantine-silent peer set: pinned, or peers 1..=f.
    pub fn faulty_set(&self) -> Vec<u32> {
        match &self.faulty_peers {
            Some(peers) => peers.clone(),
            None => (1..=self.max_faulty.min(self.num_nodes - 1)).collect(),
        }
    }

    /// Lower the protocol configuration for the cluster.
    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig::new(self.num_nodes, self.data_shards(), self.max_faulty)
            .with_mode(self.mode)
            .with_txns_per_block(self.txns_per_block)
            .with_network(self.network)
            .with_read_deadline(self.read_deadline)
            .with_base_port(self.base_port)
            .with_seed(self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_shards_default_is_n_minus_f() {
        let config = ExperimentConfig::new(10, 3);
        assert_eq!(config.data_shards(), 7);
    }

    #[test]
    fn test_faulty_set_defaults_to_first_f_peers() {
        let config = ExperimentConfig::new(10, 3);
        assert_eq!(config.faulty_set(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pinned_faulty_set_wins() {
        let config = ExperimentConfig::new(10, 3).with_faulty_peers(vec![1, 4, 9]);
        assert_eq!(config.faulty_set(), vec![1, 4, 9]);
    }
}
