//! A node in the fully-connected peer set.
//!
//! Every node serves chunk requests; any node can additionally run recovery
//! sessions when it has fallen behind. The peer arena (directory, in-flight
//! flags, blacklist) persists for the lifetime of the node, across sessions.

use crate::config::ProtocolConfig;
use crate::coordinator::{RecoveryCoordinator, SessionReport};
use crate::peers::PeerTable;
use crate::responder::Responder;
use blocksync_types::{BlockId, PeerId};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// How this node behaves as a responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behavior {
    /// Answers every request correctly.
    #[default]
    Honest,
    /// Byzantine under the experiment fault model: never answers.
    Silent,
    /// Returns chunks with a flipped payload byte (proofs become invalid).
    Tamper,
    /// Commits to a different block; proofs are self-consistent but the
    /// root disagrees with honest peers.
    WrongBlock,
}

/// Handle to a started node's accept loop.
pub struct NodeHandle {
    pub addr: SocketAddr,
    join: JoinHandle<()>,
}

impl NodeHandle {
    /// Stop serving.
    pub fn abort(&self) {
        self.join.abort();
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// One node: responder plus (optional) recovery coordinator.
pub struct Node {
    id: PeerId,
    config: ProtocolConfig,
    behavior: Behavior,
    peers: Arc<Mutex<PeerTable>>,
}

impl Node {
    pub fn new(id: PeerId, config: ProtocolConfig, behavior: Behavior) -> Self {
        let directory = (0..config.num_nodes).map(|i| (PeerId(i), config.addr_of(PeerId(i))));
        let peers = Arc::new(Mutex::new(PeerTable::new(id, directory)));
        Self {
            id,
            config,
            behavior,
            peers,
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Shared view of the peer arena (blacklist inspection in tests and
    /// harness reporting).
    pub fn peers(&self) -> Arc<Mutex<PeerTable>> {
        Arc::clone(&self.peers)
    }

    /// Bind the listen socket and spawn the responder accept loop.
    pub async fn start(&self) -> std::io::Result<NodeHandle> {
        let addr = self.config.addr_of(self.id);
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(node = %self.id, %local, behavior = ?self.behavior, "node listening");

        let responder = Arc::new(Responder::new(self.id, self.config.clone(), self.behavior));
        let join = tokio::spawn(responder.serve(listener));
        Ok(NodeHandle { addr: local, join })
    }

    /// Recover one missing block from the peer set.
    pub async fn recover(&self, block_id: BlockId) -> SessionReport {
        let coordinator =
            RecoveryCoordinator::new(self.id, self.config.clone(), Arc::clone(&self.peers));
        coordinator.run(block_id).await
    }
}
