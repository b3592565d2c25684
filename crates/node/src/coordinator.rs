//! Recovery coordinator: the requester side of a sync session.
//!
//! The coordinator fans out N−1 chunk requests (chunk i to peer i), bounded
//! by the admission semaphore. Each peer task owns one connection and one
//! response parser; verified chunks land in a shared table behind a single
//! mutex. Entering `Reconstructing` flips the cancellation token; tasks
//! observe it at every suspension point and late arrivals are discarded.
//!
//! Failure handling follows the protocol taxonomy: transport and framing
//! errors blacklist the source and retry the same chunk on a uniformly
//! selected replacement; proof and commitment failures blacklist without
//! ever retrying the same peer; running out of candidates fails the session.

use crate::chunkset::{decode_lt_batch, rs_codec, ChunkSet};
use crate::config::{ProtocolConfig, SyncMode};
use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use crate::peers::PeerTable;
use blocksync_coding::rs::strip_zero_padding;
use blocksync_coding::{lt, PrimeField};
use blocksync_commitment::{verify, VectorCommitment, HASHER_SHA256};
use blocksync_messages::{ChunkRequest, ChunkResponse, Envelope, Payload};
use blocksync_net::PeerSession;
use blocksync_types::{Block, BlockId, Hash, PeerId, HEADER_WITH_COMMITMENT_BYTES};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// Lifecycle of one sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Reconstructing,
    Failed,
}

/// One verified chunk in the table.
#[derive(Debug, Clone)]
struct StoredChunk {
    data: Vec<u8>,
    source: PeerId,
    root: [u8; 32],
}

/// Everything behind the single session mutex. Critical sections are O(1)
/// except the rare commitment-vote recount.
struct SessionState {
    phase: Phase,
    chunks: BTreeMap<i32, StoredChunk>,
    /// Commitment root (or block-hash attestation) -> voters.
    votes: BTreeMap<[u8; 32], BTreeSet<PeerId>>,
    /// Whole-block mode: candidate block bytes per attested hash.
    candidates: BTreeMap<[u8; 32], Vec<u8>>,
    /// Bytes recovered by an early (LT / whole-block) reconstruction.
    recovered: Option<Vec<u8>>,
    failure: Option<SyncError>,
    metrics: SyncMetrics,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: Phase::Collecting,
            chunks: BTreeMap::new(),
            votes: BTreeMap::new(),
            candidates: BTreeMap::new(),
            recovered: None,
            failure: None,
            metrics: SyncMetrics::start(),
        }
    }

    /// The plurality root, its vote count, and the total vote count.
    fn majority(&self) -> Option<([u8; 32], usize, usize)> {
        let total: usize = self.votes.values().map(|v| v.len()).sum();
        self.votes
            .iter()
            .max_by(|(ra, va), (rb, vb)| va.len().cmp(&vb.len()).then(rb.cmp(ra)))
            .map(|(root, voters)| (*root, voters.len(), total))
    }

    fn fail(&mut self, kind: SyncError) {
        if self.phase != Phase::Failed {
            self.phase = Phase::Failed;
            self.failure = Some(kind);
        }
    }
}

/// Final session outcome returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Block recovered and re-verified; payload size in bytes.
    Done { bytes: usize },
    /// Session failed; the dominant error kind.
    Failed { kind: SyncError },
}

impl SessionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, SessionOutcome::Done { .. })
    }
}

/// Outcome plus the metrics collected along the way.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub block_id: BlockId,
    pub outcome: SessionOutcome,
    pub metrics: SyncMetrics,
}

struct Shared {
    self_id: PeerId,
    config: ProtocolConfig,
    block_id: BlockId,
    state: Mutex<SessionState>,
    peers: Arc<Mutex<PeerTable>>,
    semaphore: Semaphore,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    rng: Mutex<ChaCha8Rng>,
}

impl Shared {
    fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    fn cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }
}

/// Drives one block-recovery session.
pub struct RecoveryCoordinator {
    self_id: PeerId,
    config: ProtocolConfig,
    peers: Arc<Mutex<PeerTable>>,
}

impl RecoveryCoordinator {
    pub fn new(self_id: PeerId, config: ProtocolConfig, peers: Arc<Mutex<PeerTable>>) -> Self {
        Self {
            self_id,
            config,
            peers,
        }
    }

    /// Run a full session for `block_id`.
    pub async fn run(&self, block_id: BlockId) -> SessionReport {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            self_id: self.self_id,
            config: self.config.clone(),
            block_id,
            state: Mutex::new(SessionState::new()),
            peers: Arc::clone(&self.peers),
            semaphore: Semaphore::new(self.config.admission_limit()),
            cancel_tx,
            cancel_rx,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(
                self.config.seed ^ block_id.0 as u64,
            )),
        });

        let available: Vec<PeerId> = {
            let peers = self.peers.lock().unwrap();
            peers.available()
        };
        if available.is_empty() {
            shared
                .state
                .lock()
                .unwrap()
                .fail(SyncError::InsufficientPeers);
            return finalize(&shared);
        }

        // Chunk i is first asked of peer i; ids whose home peer is already
        // blacklisted (from an earlier session) start on a fallback.
        let assignments: Vec<(PeerId, i32)> = match self.config.mode {
            SyncMode::WholeBlock => available.iter().map(|p| (*p, 0)).collect(),
            SyncMode::Rs | SyncMode::Lt => (0..self.config.num_nodes)
                .filter(|i| *i != self.self_id.0)
                .enumerate()
                .map(|(idx, i)| {
                    let home = PeerId(i);
                    let initial = if available.contains(&home) {
                        home
                    } else {
                        available[idx % available.len()]
                    };
                    (initial, i as i32)
                })
                .collect(),
        };

        tracing::info!(
            node = %self.self_id,
            %block_id,
            mode = self.config.mode.as_str(),
            fanout = assignments.len(),
            admission = self.config.admission_limit(),
            "sync session started"
        );

        let handles: Vec<JoinHandle<()>> = assignments
            .into_iter()
            .map(|(peer, chunk_id)| {
                let shared = Arc::clone(&shared);
                tokio::spawn(fetch_task(shared, peer, chunk_id))
            })
            .collect();

        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        match self.config.session_deadline {
            Some(deadline) => {
                if tokio::time::timeout(deadline, join_all).await.is_err() {
                    tracing::warn!(node = %self.self_id, %block_id, "session deadline exceeded");
                    shared.state.lock().unwrap().fail(SyncError::Timeout);
                    shared.cancel();
                }
            }
            None => join_all.await,
        }

        finalize(&shared)
    }
}

/// One peer task: fetch `chunk_id`, failing over across peers until the
/// chunk verifies, the session ends, or candidates run out.
async fn fetch_task(shared: Arc<Shared>, initial_peer: PeerId, chunk_id: i32) {
    let mut cancel = shared.cancel_rx.clone();
    let mut peer = initial_peer;

    loop {
        if shared.cancelled() {
            return;
        }

        let permit = tokio::select! {
            _ = cancel.changed() => return,
            permit = shared.semaphore.acquire() => match permit {
                Ok(p) => p,
                Err(_) => return,
            },
        };

        let result = tokio::select! {
            _ = cancel.changed() => {
                return;
            }
            result = exchange(&shared, peer, chunk_id) => result,
        };
        drop(permit);
        shared.peers.lock().unwrap().set_in_flight(peer, false);

        match result {
            Ok(()) => return,
            Err(err) => {
                tracing::debug!(%peer, chunk = chunk_id, %err, "peer exchange failed");
                // Bad peers are blacklisted even when the session has
                // already moved on; the verdict about them stands.
                shared.peers.lock().unwrap().blacklist(peer, err.kind());
                {
                    let mut state = shared.state.lock().unwrap();
                    if state.phase != Phase::Collecting {
                        return;
                    }
                    state.metrics.record_failed();
                }

                // Whole-block mode binds one attestation per peer; there is
                // nothing to retry elsewhere, but losing this attester may
                // make the 2f+1 quorum unreachable.
                if shared.config.mode == SyncMode::WholeBlock {
                    if quorum_unreachable(&shared) {
                        shared
                            .state
                            .lock()
                            .unwrap()
                            .fail(SyncError::InsufficientPeers);
                        shared.cancel();
                    }
                    return;
                }

                // Any peer can serve any chunk index, so the session is
                // lost only once no replacement candidates remain.
                let replacement = {
                    let peers = shared.peers.lock().unwrap();
                    let mut rng = shared.rng.lock().unwrap();
                    peers.select_replacement(&mut *rng, peer)
                };
                match replacement {
                    Some(next) => {
                        shared.state.lock().unwrap().metrics.record_retry();
                        tracing::info!(failed = %peer, %next, chunk = chunk_id, "retrying on replacement peer");
                        peer = next;
                    }
                    None => {
                        shared.state.lock().unwrap().fail(SyncError::InsufficientPeers);
                        shared.cancel();
                        return;
                    }
                }
            }
        }
    }
}

/// Whole-block mode: can the best attestation still reach 2f+1?
///
/// The ceiling is the best vote count plus the peers that could still cast
/// one — non-blacklisted peers that have not voted for any root. Peers
/// already folded into a vote count must not be counted again.
fn quorum_unreachable(shared: &Shared) -> bool {
    let available: Vec<PeerId> = shared.peers.lock().unwrap().available();
    let state = shared.state.lock().unwrap();
    if state.phase != Phase::Collecting {
        return false;
    }
    let best = state.majority().map(|(_, count, _)| count).unwrap_or(0);
    let unvoted = available
        .iter()
        .filter(|peer| !state.votes.values().any(|voters| voters.contains(peer)))
        .count();
    best + unvoted < shared.config.attestation_quorum()
}

/// One connect/request/verify round against one peer.
async fn exchange(shared: &Shared, peer: PeerId, chunk_id: i32) -> Result<(), SyncError> {
    let addr = {
        let mut peers = shared.peers.lock().unwrap();
        if peers.is_blacklisted(peer) {
            return Err(SyncError::Transport("peer already blacklisted".into()));
        }
        peers.set_in_flight(peer, true);
        peers
            .addr(peer)
            .ok_or_else(|| SyncError::Transport("unknown peer".into()))?
    };

    let mut session = PeerSession::connect_with_buffer(
        addr,
        shared.config.read_deadline,
        shared.config.buffer_size,
    )
    .await?;
    let request = Envelope::request(
        shared.self_id.0 as i32,
        peer.0 as i32,
        ChunkRequest {
            node_id: shared.self_id.0 as i32,
            block_id: shared.block_id.0,
            chunk_id,
        },
    );
    // Uplink half of the network model; the responder pays the downlink half.
    shared.config.network.throttle(request.to_wire().len()).await;
    if shared.config.mode == SyncMode::WholeBlock {
        // The naive protocol fetches the header + commitment tag before the
        // body; charge its transfer cost up front.
        shared
            .config
            .network
            .throttle(HEADER_WITH_COMMITMENT_BYTES)
            .await;
    }
    session.send(&request).await?;

    let envelope = session.next_message().await?;
    let response = match envelope.payload {
        Payload::Response(r) | Payload::LastResponse(r) => r,
        Payload::Request(_) => {
            return Err(SyncError::Framing("unexpected request from responder".into()))
        }
    };
    if response.chunk_id != chunk_id {
        return Err(SyncError::Framing(format!(
            "asked for chunk {chunk_id}, got {}",
            response.chunk_id
        )));
    }

    {
        let mut state = shared.state.lock().unwrap();
        state.metrics.record_response(response.chunk.data.len());
    }
    shared
        .peers
        .lock()
        .unwrap()
        .record_bytes(peer, response.chunk.data.len());

    match shared.config.mode {
        SyncMode::WholeBlock => handle_block_response(shared, peer, response),
        SyncMode::Rs | SyncMode::Lt => handle_chunk_response(shared, peer, chunk_id, response),
    }
}

/// Verify and insert one RS shard or LT batch.
fn handle_chunk_response(
    shared: &Shared,
    peer: PeerId,
    chunk_id: i32,
    response: ChunkResponse,
) -> Result<(), SyncError> {
    let root: [u8; 32] = response
        .commitment
        .as_slice()
        .try_into()
        .map_err(|_| SyncError::ProofVerify)?;
    let commitment = VectorCommitment {
        root: Hash::from_bytes(root),
        leaf_count: shared.config.num_nodes,
        hasher_id: HASHER_SHA256,
    };
    let proof = response.chunk.proof.to_inclusion_proof(chunk_id as u32);

    let verify_started = Instant::now();
    let proof_ok = verify(&commitment, &response.chunk.data, &proof, chunk_id as u32);
    let verify_elapsed = verify_started.elapsed();

    // A chunk is inserted only after its proof verified against the
    // commitment delivered with this same message.
    if !proof_ok {
        let mut state = shared.state.lock().unwrap();
        state.metrics.record_verification_time(verify_elapsed);
        return Err(SyncError::ProofVerify);
    }

    let mut dissenters: Vec<PeerId> = Vec::new();
    let mut decode_input: Option<Vec<Vec<u8>>> = None;
    let result = {
        let mut state = shared.state.lock().unwrap();
        state.metrics.record_verification_time(verify_elapsed);
        if state.phase != Phase::Collecting {
            // Late arrival after reconstruction started; discard.
            return Ok(());
        }

        state.votes.entry(root).or_default().insert(peer);
        let (majority_root, majority_count, total) =
            state.majority().expect("vote just inserted");
        let dissent = total - majority_count;

        if dissent > 0 {
            dissenters = state
                .votes
                .iter()
                .filter(|(r, _)| **r != majority_root)
                .flat_map(|(_, voters)| voters.iter().copied())
                .collect();
        }

        if dissent >= shared.config.max_faulty as usize + 1 {
            tracing::error!(
                %peer,
                dissent,
                "commitment conflict beyond f+1, aborting session"
            );
            state.fail(SyncError::CommitmentConflict);
            shared.cancel();
            Ok(())
        } else if root != majority_root {
            // Minority voter: reject its chunk, caller blacklists.
            Err(SyncError::CommitmentConflict)
        } else {
            // A majority flip evicts chunks verified under a losing root.
            state.chunks.retain(|_, c| c.root == majority_root);

            if let std::collections::btree_map::Entry::Vacant(slot) =
                state.chunks.entry(chunk_id)
            {
                slot.insert(StoredChunk {
                    data: response.chunk.data,
                    source: peer,
                    root,
                });
                state.metrics.record_verified();
                tracing::debug!(
                    %peer,
                    chunk = chunk_id,
                    verified = state.chunks.len(),
                    "chunk verified"
                );
            }

            match shared.config.mode {
                SyncMode::Rs => {
                    if state.chunks.len() >= shared.config.data_shards as usize {
                        state.phase = Phase::Reconstructing;
                        shared.cancel();
                    }
                }
                SyncMode::Lt => {
                    decode_input =
                        Some(state.chunks.values().map(|c| c.data.clone()).collect());
                }
                SyncMode::WholeBlock => unreachable!("handled by handle_block_response"),
            }
            Ok(())
        }
    };

    for dissenter in dissenters {
        shared
            .peers
            .lock()
            .unwrap()
            .blacklist(dissenter, crate::error::ErrorKind::CommitmentConflict);
    }

    // LT decode runs outside the lock; on success the session moves on.
    if let Some(batches) = decode_input {
        if let Some(bytes) = try_lt_decode(&shared.config, &batches) {
            let mut state = shared.state.lock().unwrap();
            if state.phase == Phase::Collecting {
                state.recovered = Some(bytes);
                state.phase = Phase::Reconstructing;
                shared.cancel();
            }
        }
    }

    result
}

/// Whole-block path: every peer returns the full block; its hash is the
/// attestation. Accept only after 2f+1 matching attestations.
fn handle_block_response(
    shared: &Shared,
    peer: PeerId,
    response: ChunkResponse,
) -> Result<(), SyncError> {
    let root: [u8; 32] = response
        .commitment
        .as_slice()
        .try_into()
        .map_err(|_| SyncError::ProofVerify)?;

    let verify_started = Instant::now();
    let block = Block::from_canonical_bytes(&response.chunk.data)
        .map_err(|_| SyncError::ProofVerify)?;
    let consistent = block.verify_hash() && *block.compute_hash().as_bytes() == root;
    let verify_elapsed = verify_started.elapsed();
    if !consistent {
        let mut state = shared.state.lock().unwrap();
        state.metrics.record_verification_time(verify_elapsed);
        return Err(SyncError::ProofVerify);
    }

    let mut dissenters: Vec<PeerId> = Vec::new();
    {
        let mut state = shared.state.lock().unwrap();
        state.metrics.record_verification_time(verify_elapsed);
        if state.phase != Phase::Collecting {
            return Ok(());
        }

        state.votes.entry(root).or_default().insert(peer);
        state.candidates.entry(root).or_insert(response.chunk.data);
        state.metrics.record_verified();

        let (majority_root, majority_count, _total) =
            state.majority().expect("vote just inserted");
        if majority_count >= shared.config.attestation_quorum() {
            // Quorum reached: dissenting attesters are provably wrong.
            dissenters = state
                .votes
                .iter()
                .filter(|(r, _)| **r != majority_root)
                .flat_map(|(_, voters)| voters.iter().copied())
                .collect();
            let bytes = state
                .candidates
                .get(&majority_root)
                .expect("every vote stores its candidate")
                .clone();
            state.recovered = Some(bytes);
            state.phase = Phase::Reconstructing;
            shared.cancel();
        }
    }

    for dissenter in dissenters {
        shared
            .peers
            .lock()
            .unwrap()
            .blacklist(dissenter, crate::error::ErrorKind::CommitmentConflict);
    }
    Ok(())
}

/// Attempt a peeling decode over every verified batch. Returns the block
/// bytes on success, `None` while the symbol set is still underdetermined.
fn try_lt_decode(config: &ProtocolConfig, batches: &[Vec<u8>]) -> Option<Vec<u8>> {
    let mut message_len: Option<u32> = None;
    let mut payload_len: Option<u64> = None;
    let mut symbols = Vec::new();
    for raw in batches {
        let batch = decode_lt_batch(raw).ok()?;
        // Headers are commitment-verified, so honest batches agree.
        if *message_len.get_or_insert(batch.message_len) != batch.message_len
            || *payload_len.get_or_insert(batch.payload_len) != batch.payload_len
        {
            return None;
        }
        symbols.extend(batch.symbols);
    }
    let k = message_len? as usize;
    if symbols.len() < k {
        return None;
    }

    let field = PrimeField::new(config.lt.prime);
    let message = lt::decode(&symbols, k, field).ok()?;
    lt::bytes_from_symbols(&message, field, payload_len? as usize).ok()
}

/// Produce the final report once every task has stopped.
fn finalize(shared: &Shared) -> SessionReport {
    let (phase, failure, recovered, shards, majority_root) = {
        let mut state = shared.state.lock().unwrap();
        state.metrics.finish();
        let shards: BTreeMap<i32, Vec<u8>> = state
            .chunks
            .iter()
            .map(|(id, c)| (*id, c.data.clone()))
            .collect();
        (
            state.phase,
            state.failure.clone(),
            state.recovered.clone(),
            shards,
            state.majority().map(|(root, _, _)| root),
        )
    };

    let outcome = match phase {
        Phase::Failed => SessionOutcome::Failed {
            kind: failure.unwrap_or(SyncError::InsufficientPeers),
        },
        Phase::Collecting => {
            // Every task finished without triggering reconstruction. For LT
            // that means the symbol set never became decodable.
            let kind = match failure {
                Some(kind) => kind,
                None if shared.config.mode == SyncMode::Lt && !shards.is_empty() => {
                    SyncError::Reconstruct("LT decoder stalled".into())
                }
                None => SyncError::InsufficientPeers,
            };
            SessionOutcome::Failed { kind }
        }
        Phase::Reconstructing => match reconstruct(shared, recovered, shards, majority_root) {
            Ok(bytes) => SessionOutcome::Done { bytes: bytes.len() },
            Err(err) => SessionOutcome::Failed { kind: err },
        },
    };

    let metrics = shared.state.lock().unwrap().metrics.clone();
    match &outcome {
        SessionOutcome::Done { bytes } => {
            tracing::info!(
                node = %shared.self_id,
                block = %shared.block_id,
                bytes,
                verified = metrics.verified_chunks,
                failed = metrics.failed_chunks,
                duration_ms = metrics.total_duration().as_millis() as u64,
                "sync session done"
            );
        }
        SessionOutcome::Failed { kind } => {
            tracing::warn!(
                node = %shared.self_id,
                block = %shared.block_id,
                %kind,
                verified = metrics.verified_chunks,
                failed = metrics.failed_chunks,
                "sync session failed"
            );
        }
    }

    SessionReport {
        block_id: shared.block_id,
        outcome,
        metrics,
    }
}

/// Rebuild the block bytes and re-verify them against the block hash and
/// the majority commitment.
fn reconstruct(
    shared: &Shared,
    recovered: Option<Vec<u8>>,
    shards: BTreeMap<i32, Vec<u8>>,
    majority_root: Option<[u8; 32]>,
) -> Result<Vec<u8>, SyncError> {
    let bytes = match shared.config.mode {
        SyncMode::WholeBlock | SyncMode::Lt => recovered
            .ok_or_else(|| SyncError::Reconstruct("no recovered payload".into()))?,
        SyncMode::Rs => {
            let codec = rs_codec(&shared.config)?;
            let n = shared.config.num_nodes as usize;
            let mut slots: Vec<Option<Vec<u8>>> = vec![None; n];
            for (id, data) in shards {
                if (id as usize) < n {
                    slots[id as usize] = Some(data);
                }
            }
            codec
                .reconstruct(&mut slots)
                .map_err(|e| SyncError::Reconstruct(e.to_string()))?;
            let data_shards: Vec<Vec<u8>> = slots
                .into_iter()
                .take(codec.data_shards())
                .map(|s| s.expect("reconstruct fills every slot"))
                .collect();
            let mut joined = Vec::new();
            for shard in &data_shards {
                joined.extend_from_slice(shard);
            }
            strip_zero_padding(joined)
        }
    };

    let block = Block::from_canonical_bytes(&bytes)
        .map_err(|e| SyncError::Reconstruct(format!("recovered bytes do not parse: {e}")))?;
    if block.id != shared.block_id.0 {
        return Err(SyncError::Reconstruct(format!(
            "recovered block {} but session wanted {}",
            block.id, shared.block_id.0
        )));
    }
    if !block.verify_hash() {
        return Err(SyncError::Reconstruct(
            "recovered block fails its own hash".into(),
        ));
    }

    // The commitment is bound to the block: re-chunking the recovered block
    // must reproduce the majority root.
    if shared.config.mode != SyncMode::WholeBlock {
        let root = majority_root
            .ok_or_else(|| SyncError::Reconstruct("no commitment majority".into()))?;
        let set = ChunkSet::build(&shared.config, &block)?;
        if *set.commitment.root.as_bytes() != root {
            return Err(SyncError::Reconstruct(
                "recovered block does not match the commitment".into(),
            ));
        }
    }

    Ok(bytes)
}
