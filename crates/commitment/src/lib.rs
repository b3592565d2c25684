//! Merkle vector commitment over ordered leaves.
//!
//! A binary Merkle tree with domain-separated hashing:
//!
//! - leaf node  = SHA-256(0x00 ‖ leaf_bytes)
//! - inner node = SHA-256(0x01 ‖ left ‖ right)
//!
//! The split point of an n-node subtree is the largest power of two strictly
//! below n, and lone nodes are promoted unchanged — the standard Tendermint
//! tree shape, so proofs stay ≤ ⌈log₂ n⌉ siblings without padding leaves.
//!
//! The domain separation byte blocks second-preimage attacks that splice an
//! inner node in as a leaf.

use blocksync_types::Hash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Identifier for the SHA-256 hasher, carried in the commitment.
pub const HASHER_SHA256: u8 = 1;

/// Hard upper bound on proof depth (2^64 leaves is unreachable).
const MAX_PROOF_DEPTH: usize = 64;

/// Errors building a commitment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("cannot commit to an empty leaf set")]
    NoLeaves,
}

/// A succinct binding to an ordered sequence of leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorCommitment {
    pub root: Hash,
    pub leaf_count: u32,
    pub hasher_id: u8,
}

/// Opening proof for one leaf position: the sibling hashes bottom→top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub index: u32,
    pub siblings: Vec<[u8; 32]>,
}

fn leaf_hash(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(bytes);
    hasher.finalize().into()
}

fn inner_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Largest power of two strictly less than `n` (n >= 2).
fn split_point(n: usize) -> usize {
    debug_assert!(n >= 2);
    let mut k = 1usize;
    while k * 2 < n {
        k *= 2;
    }
    k
}

/// Recursively compute the subtree root, appending each level's sibling to
/// the proofs of the leaves on the other side.
fn build(hashes: &[[u8; 32]], proofs: &mut [Vec<[u8; 32]>]) -> [u8; 32] {
    match hashes.len() {
        1 => hashes[0],
        n => {
            let k = split_point(n);
            let (left_hashes, right_hashes) = hashes.split_at(k);
            let (left_proofs, right_proofs) = proofs.split_at_mut(k);
            let left = build(left_hashes, left_proofs);
            let right = build(right_hashes, right_proofs);
            for proof in left_proofs {
                proof.push(right);
            }
            for proof in right_proofs {
                proof.push(left);
            }
            inner_hash(&left, &right)
        }
    }
}

/// Commit to `leaves`, returning the commitment and one proof per index.
pub fn commit_with_proofs<L: AsRef<[u8]>>(
    leaves: &[L],
) -> Result<(VectorCommitment, Vec<InclusionProof>), CommitmentError> {
    if leaves.is_empty() {
        return Err(CommitmentError::NoLeaves);
    }
    let hashes: Vec<[u8; 32]> = leaves.iter().map(|l| leaf_hash(l.as_ref())).collect();
    let mut siblings: Vec<Vec<[u8; 32]>> = vec![Vec::new(); leaves.len()];
    let root = build(&hashes, &mut siblings);

    let proofs = siblings
        .into_iter()
        .enumerate()
        .map(|(index, siblings)| InclusionProof {
            index: index as u32,
            siblings,
        })
        .collect();

    let commitment = VectorCommitment {
        root: Hash::from_bytes(root),
        leaf_count: leaves.len() as u32,
        hasher_id: HASHER_SHA256,
    };
    Ok((commitment, proofs))
}

/// Root over `leaves` without proofs (used to re-check a reconstruction).
pub fn root_of<L: AsRef<[u8]>>(leaves: &[L]) -> Result<Hash, CommitmentError> {
    commit_with_proofs(leaves).map(|(c, _)| c.root)
}

/// Fold the proof back up to a root, mirroring the tree shape at build time.
fn fold(index: u32, total: u32, leaf: [u8; 32], siblings: &[[u8; 32]]) -> Option<[u8; 32]> {
    if total == 1 {
        return siblings.is_empty().then_some(leaf);
    }
    let (last, rest) = siblings.split_last()?;
    let k = split_point(total as usize) as u32;
    if index < k {
        let sub = fold(index, k, leaf, rest)?;
        Some(inner_hash(&sub, last))
    } else {
        let sub = fold(index - k, total - k, leaf, rest)?;
        Some(inner_hash(last, &sub))
    }
}

/// Verify that `leaf_bytes` sits at `index` under the committed root.
///
/// Rejects mismatched indices, wrong hashers, out-of-range positions, and
/// any proof whose recomputed path misses the root.
pub fn verify(
    commitment: &VectorCommitment,
    leaf_bytes: &[u8],
    proof: &InclusionProof,
    index: u32,
) -> bool {
    if commitment.hasher_id != HASHER_SHA256 {
        return false;
    }
    if proof.index != index || index >= commitment.leaf_count {
        return false;
    }
    if proof.siblings.len() > MAX_PROOF_DEPTH {
        return false;
    }
    match fold(
        index,
        commitment.leaf_count,
        leaf_hash(leaf_bytes),
        &proof.siblings,
    ) {
        Some(root) => root == *commitment.root.as_bytes(),
        None => false,
    }
}
