//! Peer arena and blacklist.
//!
//! Nodes never hold references to each other; tasks refer to peers by
//! [`PeerId`] and fetch state from this arena. Blacklisting is monotone for
//! the lifetime of the node: once a peer is out, it stays out.

use crate::error::ErrorKind;
use blocksync_types::PeerId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Requester-side view of one peer.
#[derive(Debug, Clone)]
pub struct PeerState {
    pub peer_id: PeerId,
    pub addr: SocketAddr,
    pub in_flight: bool,
    pub blacklisted: bool,
    pub bytes_received: u64,
    pub last_error: Option<ErrorKind>,
}

/// Arena of peers keyed by id. Persists for the lifetime of the node.
#[derive(Debug)]
pub struct PeerTable {
    self_id: PeerId,
    peers: BTreeMap<PeerId, PeerState>,
}

impl PeerTable {
    pub fn new(self_id: PeerId, directory: impl IntoIterator<Item = (PeerId, SocketAddr)>) -> Self {
        let peers = directory
            .into_iter()
            .filter(|(id, _)| *id != self_id)
            .map(|(peer_id, addr)| {
                (
                    peer_id,
                    PeerState {
                        peer_id,
                        addr,
                        in_flight: false,
                        blacklisted: false,
                        bytes_received: 0,
                        last_error: None,
                    },
                )
            })
            .collect();
        Self { self_id, peers }
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    pub fn addr(&self, peer: PeerId) -> Option<SocketAddr> {
        self.peers.get(&peer).map(|p| p.addr)
    }

    pub fn get(&self, peer: PeerId) -> Option<&PeerState> {
        self.peers.get(&peer)
    }

    /// All peer ids except self, blacklisted or not.
    pub fn all(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Mark a peer blacklisted, recording why. Never unset.
    pub fn blacklist(&mut self, peer: PeerId, reason: ErrorKind) {
        if let Some(state) = self.peers.get_mut(&peer) {
            state.blacklisted = true;
            state.in_flight = false;
            state.last_error = Some(reason);
            tracing::warn!(%peer, ?reason, "peer blacklisted");
        }
    }

    pub fn is_blacklisted(&self, peer: PeerId) -> bool {
        self.peers.get(&peer).is_some_and(|p| p.blacklisted)
    }

    pub fn set_in_flight(&mut self, peer: PeerId, in_flight: bool) {
        if let Some(state) = self.peers.get_mut(&peer) {
            state.in_flight = in_flight;
        }
    }

    pub fn record_bytes(&mut self, peer: PeerId, bytes: usize) {
        if let Some(state) = self.peers.get_mut(&peer) {
            state.bytes_received += bytes as u64;
        }
    }

    /// Non-blacklisted peers (excluding self, which is never in the arena).
    pub fn available(&self) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|p| !p.blacklisted)
            .map(|p| p.peer_id)
            .collect()
    }

    /// Count of responsive candidates left.
    pub fn available_count(&self) -> usize {
        self.peers.values().filter(|p| !p.blacklisted).count()
    }

    /// Pick a replacement peer uniformly from the non-blacklisted set,
    /// excluding `not`.
    pub fn select_replacement<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        not: PeerId,
    ) -> Option<PeerId> {
        let candidates: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| !p.blacklisted && p.peer_id != not)
            .map(|p| p.peer_id)
            .collect();
        candidates.choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::net::{IpAddr, Ipv4Addr};

    fn table(n: u32) -> PeerTable {
        let directory = (0..n).map(|i| {
            (
                PeerId(i),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000 + i as u16),
            )
        });
        PeerTable::new(PeerId(0), directory)
    }

    #[test]
    fn test_self_excluded() {
        let t = table(5);
        assert_eq!(t.all().len(), 4);
        assert!(t.get(PeerId(0)).is_none());
    }

    #[test]
    fn test_blacklist_is_monotone() {
        let mut t = table(5);
        t.blacklist(PeerId(2), ErrorKind::Transport);
        assert!(t.is_blacklisted(PeerId(2)));
        assert_eq!(t.available_count(), 3);
        assert_eq!(t.get(PeerId(2)).unwrap().last_error, Some(ErrorKind::Transport));
        // Blacklisting again with another reason keeps it blacklisted.
        t.blacklist(PeerId(2), ErrorKind::ProofVerify);
        assert!(t.is_blacklisted(PeerId(2)));
    }

    #[test]
    fn test_replacement_avoids_blacklisted_and_excluded() {
        let mut t = table(5);
        t.blacklist(PeerId(1), ErrorKind::Timeout);
        t.blacklist(PeerId(3), ErrorKind::Timeout);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..50 {
            let pick = t.select_replacement(&mut rng, PeerId(2)).unwrap();
            assert_eq!(pick, PeerId(4));
        }
    }

    #[test]
    fn test_replacement_exhausted() {
        let mut t = table(3);
        t.blacklist(PeerId(1), ErrorKind::Transport);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(t.select_replacement(&mut rng, PeerId(2)), None);
    }
}
