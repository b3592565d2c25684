//! Core types for the block synchronization testbed.
//!
//! This crate provides the foundational data model shared by every other
//! crate:
//!
//! - [`Hash`]: 32-byte SHA-256 digest with hex display
//! - [`PeerId`] / [`BlockId`]: typed identifiers
//! - [`Transaction`] / [`Block`]: the unit of recovery, with a canonical
//!   byte encoding that every honest peer can reproduce bit-identically
//! - [`EncodedSymbol`]: an LT-coded field symbol with its position set
//!
//! Nothing here performs I/O; higher layers (coding, commitment, net, node)
//! build on these types.

mod block;
mod symbol;

pub use block::{Block, Transaction};
pub use symbol::{decode_symbol_batch, encode_symbol_batch, EncodedSymbol, SymbolCodecError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fixed block header size in bytes (simulation accounting).
pub const BLOCK_HEADER_BYTES: usize = 80;

/// Size of the commitment tag carried next to the header.
pub const COMMITMENT_TAG_BYTES: usize = 24;

/// Header plus commitment tag, the fixed per-block metadata cost.
pub const HEADER_WITH_COMMITMENT_BYTES: usize = BLOCK_HEADER_BYTES + COMMITMENT_TAG_BYTES;

/// Size of one Merkle proof node.
pub const PROOF_NODE_BYTES: usize = 32;

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash arbitrary bytes with SHA-256.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut h = [0u8; 32];
        h.copy_from_slice(&out);
        Hash(h)
    }

    /// Wrap an existing 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to tell hashes apart in logs.
        write!(f, "Hash({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of a node in the fully-connected peer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Identifier of a block, the unit of recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub i64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block-{}", self.0)
    }
}
