//! Blocks and transactions.
//!
//! The block hash and the canonical JSON encoding must be reproducible
//! bit-identically by every honest peer: the responder regenerates the block
//! for a requested id, and the requester re-hashes what it reconstructed.

use crate::Hash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A transaction inside a block. Immutable once generated.
///
/// Field order is the canonical serialization order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier within the generating node.
    pub id: String,
    /// Payload carried by the transaction.
    pub content: String,
    /// Hex-encoded 32-byte signature over the content.
    pub signature: String,
    /// Unix timestamp of creation.
    pub timestamp: i64,
}

impl Transaction {
    /// Bytes that feed the block hash: `id ‖ content ‖ signature`.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.id.len() + self.content.len() + self.signature.len());
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(self.content.as_bytes());
        out.extend_from_slice(self.signature.as_bytes());
        out
    }
}

/// One block of transactions, the unit of recovery.
///
/// `hash` is derived from all other fields via [`Block::compute_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: i64,
    /// Hex-encoded hash of the predecessor block (empty at genesis).
    pub prev_hash: String,
    pub transactions: Vec<Transaction>,
    pub nonce: i64,
    pub timestamp: i64,
    /// Hex-encoded hash over all other fields.
    pub hash: String,
}

impl Block {
    /// Recompute the block hash from the other fields.
    ///
    /// Layout: `prev_hash ‖ (id ‖ content ‖ signature)* ‖ nonce ‖ timestamp`
    /// with nonce and timestamp rendered as decimal strings.
    pub fn compute_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.prev_hash.as_bytes());
        for tx in &self.transactions {
            hasher.update(tx.signing_bytes());
        }
        hasher.update(self.nonce.to_string().as_bytes());
        hasher.update(self.timestamp.to_string().as_bytes());
        let out = hasher.finalize();
        let mut h = [0u8; 32];
        h.copy_from_slice(&out);
        Hash(h)
    }

    /// Seal the block by filling in `hash`.
    pub fn seal(mut self) -> Self {
        self.hash = self.compute_hash().to_hex();
        self
    }

    /// Check that the stored hash matches the recomputed one.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash().to_hex() == self.hash
    }

    /// Canonical byte form of the block (JSON in struct field order).
    ///
    /// This is what gets chunked, committed to, and reassembled.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // serde_json writes struct fields in declaration order, so every
        // honest peer produces the same bytes for the same block.
        serde_json::to_vec(self).expect("block serialization cannot fail")
    }

    /// Parse a block back from its canonical bytes.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        let txs = (0..3)
            .map(|i| Transaction {
                id: i.to_string(),
                content: format!("Data for transaction {i}"),
                signature: Hash::digest(format!("Data for transaction {i}").as_bytes()).to_hex(),
                timestamp: 1_700_000_000,
            })
            .collect();
        Block {
            id: 7,
            prev_hash: String::new(),
            transactions: txs,
            nonce: 0,
            timestamp: 1_700_000_000,
            hash: String::new(),
        }
        .seal()
    }

    #[test]
    fn test_seal_and_verify() {
        let block = sample_block();
        assert!(block.verify_hash());

        let mut tampered = block.clone();
        tampered.transactions[1].content.push('x');
        assert!(!tampered.verify_hash());
    }

    #[test]
    fn test_canonical_roundtrip_preserves_hash() {
        let block = sample_block();
        let bytes = block.canonical_bytes();
        let parsed = Block::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(parsed, block);
        assert!(parsed.verify_hash());
        // Re-encoding must be byte-identical.
        assert_eq!(parsed.canonical_bytes(), bytes);
    }

    #[test]
    fn test_hash_depends_on_every_field() {
        let block = sample_block();
        let base = block.compute_hash();

        let mut b = block.clone();
        b.nonce = 1;
        assert_ne!(b.compute_hash(), base);

        let mut b = block.clone();
        b.timestamp += 1;
        assert_ne!(b.compute_hash(), base);

        let mut b = block.clone();
        b.prev_hash = "ff".into();
        assert_ne!(b.compute_hash(), base);
    }
}
