//! End-to-end recovery scenarios over localhost TCP.
//!
//! Every test binds real sockets, so they run under `#[serial]` with
//! disjoint port ranges.

use blocksync_net::NetworkProfile;
use blocksync_node::{
    Behavior, Node, NodeHandle, ProtocolConfig, SessionOutcome, SyncError, SyncMode,
};
use blocksync_types::{BlockId, PeerId};
use serial_test::serial;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Start one node per behavior entry; index == node id.
async fn start_cluster(config: &ProtocolConfig, behaviors: &[Behavior]) -> (Vec<Node>, Vec<NodeHandle>) {
    assert_eq!(behaviors.len(), config.num_nodes as usize);
    let mut nodes = Vec::new();
    let mut handles = Vec::new();
    for (i, behavior) in behaviors.iter().enumerate() {
        let node = Node::new(PeerId(i as u32), config.clone(), *behavior);
        // The lagging requester (node 0) also serves, like every node.
        let handle = node.start().await.expect("bind listener");
        nodes.push(node);
        handles.push(handle);
    }
    (nodes, handles)
}

fn behaviors(n: usize, faulty: &[(usize, Behavior)]) -> Vec<Behavior> {
    let mut all = vec![Behavior::Honest; n];
    for (idx, b) in faulty {
        all[*idx] = *b;
    }
    all
}

#[tokio::test]
#[serial]
async fn test_rs_recovery_all_honest() {
    init_tracing();
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(20)
        .with_base_port(9300)
        .with_read_deadline(Duration::from_secs(2));

    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &[])).await;
    let report = nodes[0].recover(BlockId(0)).await;

    match report.outcome {
        SessionOutcome::Done { bytes } => assert!(bytes > 0),
        SessionOutcome::Failed { kind } => panic!("expected Done, got {kind}"),
    }
    assert_eq!(report.metrics.verified_chunks, 6);
}

#[tokio::test]
#[serial]
async fn test_rs_recovery_with_silent_byzantine_peers() {
    init_tracing();
    // N=10, K=6, f=3; peers 1, 4 and 9 never respond. The coordinator must
    // fail over and still finish with exactly K verified chunks.
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(20)
        .with_base_port(9320)
        .with_read_deadline(Duration::from_millis(500));

    let faulty = [
        (1, Behavior::Silent),
        (4, Behavior::Silent),
        (9, Behavior::Silent),
    ];
    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &faulty)).await;
    let report = nodes[0].recover(BlockId(7)).await;

    assert!(report.outcome.is_done(), "outcome: {:?}", report.outcome);
    assert_eq!(report.metrics.verified_chunks, 6);
}

#[tokio::test]
#[serial]
async fn test_corrupted_chunks_rejected_and_peers_blacklisted() {
    init_tracing();
    // Peers 1-4 flip the last byte of every chunk they serve. Only five
    // honest peers remain, so reaching K=6 forces at least one proof
    // failure, a blacklist entry, and a failover onto an honest peer.
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(20)
        .with_base_port(9340)
        .with_read_deadline(Duration::from_secs(2));

    let faulty: Vec<(usize, Behavior)> =
        (1..5).map(|i| (i, Behavior::Tamper)).collect();
    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &faulty)).await;
    let report = nodes[0].recover(BlockId(3)).await;

    assert!(report.outcome.is_done(), "outcome: {:?}", report.outcome);
    assert_eq!(report.metrics.verified_chunks, 6);
    assert!(report.metrics.failed_chunks >= 1);
    assert!(report.metrics.retries >= 1);

    let peers = nodes[0].peers();
    let peers = peers.lock().unwrap();
    let blacklisted = (1..5).filter(|i| peers.is_blacklisted(PeerId(*i))).count();
    assert!(blacklisted >= 1, "at least one tampering peer must be caught");
}

#[tokio::test]
#[serial]
async fn test_commitment_conflict_aborts_session() {
    init_tracing();
    // Five of nine peers commit to different content. With f=3, the dissent
    // reaches f+1 = 4 and the session must abort rather than pick a side.
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(20)
        .with_base_port(9360)
        .with_read_deadline(Duration::from_secs(2));

    let faulty: Vec<(usize, Behavior)> =
        (5..10).map(|i| (i, Behavior::WrongBlock)).collect();
    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &faulty)).await;
    let report = nodes[0].recover(BlockId(5)).await;

    match report.outcome {
        SessionOutcome::Failed {
            kind: SyncError::CommitmentConflict,
        } => {}
        other => panic!("expected CommitmentConflict, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_lt_recovery_all_honest() {
    init_tracing();
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::Lt)
        .with_txns_per_block(20)
        .with_base_port(9380)
        .with_read_deadline(Duration::from_secs(2));

    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &[])).await;
    let report = nodes[0].recover(BlockId(2)).await;

    assert!(report.outcome.is_done(), "outcome: {:?}", report.outcome);
    assert!(report.metrics.verified_chunks >= 1);
}

#[tokio::test]
#[serial]
async fn test_whole_block_quorum_accepts() {
    init_tracing();
    // 9 honest attestations out of 9 clears the 2f+1 = 7 threshold.
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::WholeBlock)
        .with_txns_per_block(20)
        .with_base_port(9400)
        .with_read_deadline(Duration::from_secs(2));

    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &[])).await;
    let report = nodes[0].recover(BlockId(1)).await;

    assert!(report.outcome.is_done(), "outcome: {:?}", report.outcome);
}

#[tokio::test]
#[serial]
async fn test_whole_block_quorum_short_of_threshold_fails() {
    init_tracing();
    // Only 6 peers attest; 2f+1 = 7 can never be reached.
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::WholeBlock)
        .with_txns_per_block(20)
        .with_base_port(9420)
        .with_read_deadline(Duration::from_millis(500));

    let faulty = [
        (3, Behavior::Silent),
        (6, Behavior::Silent),
        (8, Behavior::Silent),
    ];
    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &faulty)).await;
    let report = nodes[0].recover(BlockId(1)).await;

    match report.outcome {
        SessionOutcome::Failed {
            kind: SyncError::InsufficientPeers,
        } => {}
        other => panic!("expected InsufficientPeers, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_recovery_survives_minority_of_silent_peers_via_failover() {
    init_tracing();
    // Four silent peers leave only five responsive ones, fewer than K; the
    // session still completes because honest peers serve any chunk index.
    let config = ProtocolConfig::new(10, 6, 3)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(20)
        .with_base_port(9440)
        .with_read_deadline(Duration::from_millis(300));

    let faulty: Vec<(usize, Behavior)> =
        [1, 3, 5, 7].iter().map(|&i| (i, Behavior::Silent)).collect();
    let (nodes, _handles) = start_cluster(&config, &behaviors(10, &faulty)).await;
    let report = nodes[0].recover(BlockId(4)).await;

    assert!(report.outcome.is_done(), "outcome: {:?}", report.outcome);
    assert_eq!(report.metrics.verified_chunks, 6);
}

#[tokio::test]
#[serial]
async fn test_insufficient_peers_when_every_peer_is_silent() {
    init_tracing();
    let config = ProtocolConfig::new(5, 3, 1)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(10)
        .with_base_port(9520)
        .with_read_deadline(Duration::from_millis(200));

    let faulty: Vec<(usize, Behavior)> =
        (1..5).map(|i| (i, Behavior::Silent)).collect();
    let (nodes, _handles) = start_cluster(&config, &behaviors(5, &faulty)).await;
    let report = nodes[0].recover(BlockId(4)).await;

    match report.outcome {
        SessionOutcome::Failed {
            kind: SyncError::InsufficientPeers,
        } => {}
        other => panic!("expected InsufficientPeers, got {other:?}"),
    }

    let peers = nodes[0].peers();
    let peers = peers.lock().unwrap();
    for i in 1..5 {
        assert!(peers.is_blacklisted(PeerId(i)));
    }
}

#[tokio::test]
#[serial]
async fn test_admission_semaphore_paces_transfers() {
    init_tracing();
    // Two slots, six required chunks, and a 150 ms responder-side transfer
    // cost: at least ceil(6/2) = 3 sequential waves must elapse.
    let config = ProtocolConfig::new(7, 6, 0)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(10)
        .with_base_port(9460)
        .with_read_deadline(Duration::from_secs(5))
        .with_network(NetworkProfile::new(Duration::from_millis(150), 0))
        .with_admission_override(2);

    let (nodes, _handles) = start_cluster(&config, &behaviors(7, &[])).await;
    let started = Instant::now();
    let report = nodes[0].recover(BlockId(0)).await;
    let elapsed = started.elapsed();

    assert!(report.outcome.is_done(), "outcome: {:?}", report.outcome);
    // Each wave pays the fixed delay twice (request + response leg).
    assert!(
        elapsed >= Duration::from_millis(3 * 150),
        "elapsed {elapsed:?} too fast for 2-slot admission"
    );
}

#[tokio::test]
#[serial]
async fn test_session_deadline_enforced() {
    init_tracing();
    // All peers silent and a short session deadline: the session must stop
    // with Timeout rather than waiting out every read deadline.
    let config = ProtocolConfig::new(4, 2, 1)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(10)
        .with_base_port(9480)
        .with_read_deadline(Duration::from_secs(30))
        .with_session_deadline(Duration::from_millis(300));

    let faulty: Vec<(usize, Behavior)> =
        (1..4).map(|i| (i, Behavior::Silent)).collect();
    let (nodes, _handles) = start_cluster(&config, &behaviors(4, &faulty)).await;

    let started = Instant::now();
    let report = nodes[0].recover(BlockId(0)).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    match report.outcome {
        SessionOutcome::Failed {
            kind: SyncError::Timeout,
        } => {}
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_recovered_payload_matches_regenerated_block() {
    init_tracing();
    let config = ProtocolConfig::new(6, 4, 1)
        .with_mode(SyncMode::Rs)
        .with_txns_per_block(15)
        .with_base_port(9500)
        .with_read_deadline(Duration::from_secs(2));

    let (nodes, _handles) = start_cluster(&config, &behaviors(6, &[])).await;
    let report = nodes[0].recover(BlockId(11)).await;

    let expected = blocksync_workload::block_for(BlockId(11), 15).canonical_bytes();
    match report.outcome {
        SessionOutcome::Done { bytes } => assert_eq!(bytes, expected.len()),
        SessionOutcome::Failed { kind } => panic!("expected Done, got {kind}"),
    }
}
