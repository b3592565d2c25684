//! Protocol configuration.

use blocksync_coding::LT_FIELD_PRIME;
use blocksync_net::{NetworkProfile, DEFAULT_BUFFER_SIZE, DEFAULT_READ_DEADLINE};
use blocksync_types::PeerId;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Which recovery strategy a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Download the full block from every peer; accept after 2f+1 matching
    /// hash attestations.
    WholeBlock,
    /// (N, K) Reed–Solomon shards verified against a vector commitment.
    Rs,
    /// Rateless LT symbols over Z_p, peeling decode, commitment-verified.
    Lt,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::WholeBlock => "whole-block",
            SyncMode::Rs => "rs",
            SyncMode::Lt => "lt",
        }
    }
}

/// LT code parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtParams {
    /// Field modulus; must exceed 2^56 so block bytes pack 7 per element.
    pub prime: u64,
    /// Robust soliton failure parameter c.
    pub c: f64,
    /// Robust soliton failure parameter δ.
    pub delta: f64,
    /// Encoded-symbol overhead relative to the message length.
    pub overhead: f64,
}

impl Default for LtParams {
    fn default() -> Self {
        Self {
            prime: LT_FIELD_PRIME,
            c: 0.1,
            delta: 0.5,
            overhead: 2.5,
        }
    }
}

/// Full protocol configuration shared by requester and responders.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Total nodes N in the fully-connected set.
    pub num_nodes: u32,
    /// Data shards K (RS mode).
    pub data_shards: u32,
    /// Maximum tolerated faulty peers f.
    pub max_faulty: u32,
    /// Transactions per generated block.
    pub txns_per_block: usize,
    /// Recovery strategy.
    pub mode: SyncMode,
    /// Simulated link conditions (applied on both directions).
    pub network: NetworkProfile,
    /// Modelled requester downlink, bytes per second; drives admission.
    pub upload_bandwidth_bps: u64,
    /// Nominal block size used for admission-control sizing.
    pub block_size_hint: usize,
    /// Pin the admission limit instead of deriving it.
    pub admission_override: Option<usize>,
    /// Per-request read deadline.
    pub read_deadline: Duration,
    /// Whole-session deadline; `None` means unbounded (experiment default).
    pub session_deadline: Option<Duration>,
    /// First TCP port; node i listens on `base_port + i`.
    pub base_port: u16,
    /// Socket read buffer size.
    pub buffer_size: usize,
    /// LT code parameters.
    pub lt: LtParams,
    /// Seed for requester-side randomness (replacement peer selection).
    pub seed: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            num_nodes: 10,
            data_shards: 6,
            max_faulty: 3,
            txns_per_block: 1000,
            mode: SyncMode::Rs,
            network: NetworkProfile::UNLIMITED,
            upload_bandwidth_bps: 1_250_000,
            block_size_hint: 1 << 20,
            admission_override: None,
            read_deadline: DEFAULT_READ_DEADLINE,
            session_deadline: None,
            base_port: 8000,
            buffer_size: DEFAULT_BUFFER_SIZE,
            lt: LtParams::default(),
            seed: 42,
        }
    }
}

impl ProtocolConfig {
    pub fn new(num_nodes: u32, data_shards: u32, max_faulty: u32) -> Self {
        Self {
            num_nodes,
            data_shards,
            max_faulty,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_txns_per_block(mut self, txns: usize) -> Self {
        self.txns_per_block = txns;
        self
    }

    pub fn with_network(mut self, network: NetworkProfile) -> Self {
        self.network = network;
        self
    }

    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    pub fn with_session_deadline(mut self, deadline: Duration) -> Self {
        self.session_deadline = Some(deadline);
        self
    }

    pub fn with_admission_override(mut self, limit: usize) -> Self {
        self.admission_override = Some(limit);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Listen address of node `peer`.
    pub fn addr_of(&self, peer: PeerId) -> SocketAddr {
        SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            self.base_port + peer.0 as u16,
        )
    }

    /// Admission-semaphore size: how many peer transfers may run at once
    /// without the aggregate ingress exceeding the modelled downlink.
    ///
    /// `⌊upload_bw / (block_bytes / N)⌋`, clamped to at least one slot.
    pub fn admission_limit(&self) -> usize {
        if let Some(limit) = self.admission_override {
            return limit.max(1);
        }
        let per_chunk = (self.block_size_hint / self.num_nodes as usize).max(1);
        ((self.upload_bandwidth_bps as usize) / per_chunk).max(1)
    }

    /// Attestation quorum for whole-block mode: 2f+1.
    pub fn attestation_quorum(&self) -> usize {
        2 * self.max_faulty as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_limit_formula() {
        // 100 nodes, 1 MiB block: each chunk is 10485 bytes; a 1.25 MB/s
        // downlink admits floor(1_250_000 / 10485) = 119 transfers.
        let config = ProtocolConfig {
            num_nodes: 100,
            block_size_hint: 1 << 20,
            upload_bandwidth_bps: 1_250_000,
            ..Default::default()
        };
        assert_eq!(config.admission_limit(), 119);
    }

    #[test]
    fn test_admission_limit_clamped_to_one() {
        let config = ProtocolConfig {
            num_nodes: 2,
            block_size_hint: 1 << 30,
            upload_bandwidth_bps: 8,
            ..Default::default()
        };
        assert_eq!(config.admission_limit(), 1);
    }

    #[test]
    fn test_admission_override_wins() {
        let config = ProtocolConfig::default().with_admission_override(7);
        assert_eq!(config.admission_limit(), 7);
    }

    #[test]
    fn test_attestation_quorum() {
        assert_eq!(ProtocolConfig::new(10, 6, 3).attestation_quorum(), 7);
        assert_eq!(ProtocolConfig::new(4, 3, 1).attestation_quorum(), 3);
    }

    #[test]
    fn test_addr_layout() {
        let config = ProtocolConfig::default().with_base_port(9100);
        assert_eq!(config.addr_of(PeerId(0)).port(), 9100);
        assert_eq!(config.addr_of(PeerId(7)).port(), 9107);
    }
}
