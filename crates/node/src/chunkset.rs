//! Deterministic chunking of a block.
//!
//! The responder builds a [`ChunkSet`] for a requested block at request
//! time; nothing is pre-materialized. The construction is fully
//! deterministic — RS shards by geometry, LT symbols under a seed derived
//! from the block id — so every honest peer commits to the same leaves and
//! serves interchangeable chunks.

use crate::config::{ProtocolConfig, SyncMode};
use crate::error::SyncError;
use blocksync_coding::{lt, LtEncoder, PrimeField, RsCodec};
use blocksync_commitment::{commit_with_proofs, InclusionProof, VectorCommitment};
use blocksync_types::{
    decode_symbol_batch, encode_symbol_batch, Block, BlockId, EncodedSymbol, Hash,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Per-batch header prepended to LT chunk payloads: the decoder needs the
/// message length and the original byte length, which the wire format does
/// not carry anywhere else.
const LT_BATCH_HEADER: usize = 4 + 8;

/// The N chunks of one block plus the commitment binding them.
#[derive(Debug, Clone)]
pub struct ChunkSet {
    pub block_id: BlockId,
    pub block_hash: Hash,
    /// Leaf bytes, one per chunk index.
    pub chunks: Vec<Vec<u8>>,
    pub commitment: VectorCommitment,
    pub proofs: Vec<InclusionProof>,
}

impl ChunkSet {
    /// Build the chunk set for `block` under `config.mode`.
    pub fn build(config: &ProtocolConfig, block: &Block) -> Result<Self, SyncError> {
        let block_id = BlockId(block.id);
        let block_hash = block.compute_hash();
        let bytes = block.canonical_bytes();

        let chunks = match config.mode {
            SyncMode::WholeBlock => vec![bytes],
            SyncMode::Rs => {
                let codec = rs_codec(config)?;
                let (data_shards, _len) = codec
                    .split(&bytes)
                    .map_err(|e| SyncError::Reconstruct(e.to_string()))?;
                codec
                    .encode(data_shards)
                    .map_err(|e| SyncError::Reconstruct(e.to_string()))?
            }
            SyncMode::Lt => lt_batches(config, block_id, &bytes)?,
        };

        let (commitment, proofs) = match config.mode {
            SyncMode::WholeBlock => {
                // Whole-block mode carries the block hash as its attestation;
                // there is no Merkle tree to open.
                let commitment = VectorCommitment {
                    root: block_hash,
                    leaf_count: 1,
                    hasher_id: blocksync_commitment::HASHER_SHA256,
                };
                (commitment, vec![InclusionProof { index: 0, siblings: vec![] }])
            }
            SyncMode::Rs | SyncMode::Lt => commit_with_proofs(&chunks)
                .map_err(|e| SyncError::Reconstruct(e.to_string()))?,
        };

        Ok(Self {
            block_id,
            block_hash,
            chunks,
            commitment,
            proofs,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

pub(crate) fn rs_codec(config: &ProtocolConfig) -> Result<RsCodec, SyncError> {
    RsCodec::new(config.data_shards as usize, config.num_nodes as usize)
        .map_err(|e| SyncError::Reconstruct(e.to_string()))
}

/// Seed for LT symbol generation: shared by all honest peers for one block.
fn lt_seed(block_id: BlockId) -> u64 {
    // Block ids are small non-negative integers; fold in a fixed tag so the
    // stream differs from other uses of the id as a seed.
    (block_id.0 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

/// Encode the block bytes into M symbols and slice them into N batches.
fn lt_batches(
    config: &ProtocolConfig,
    block_id: BlockId,
    bytes: &[u8],
) -> Result<Vec<Vec<u8>>, SyncError> {
    let field = PrimeField::new(config.lt.prime);
    let message =
        lt::symbols_from_bytes(bytes, field).map_err(|e| SyncError::Reconstruct(e.to_string()))?;
    let k = message.len();
    let n = config.num_nodes as usize;

    let wanted = (k as f64 * config.lt.overhead).ceil() as usize;
    let num_symbols = wanted.max(n);

    let encoder = LtEncoder::new(k, field, config.lt.c, config.lt.delta)
        .map_err(|e| SyncError::Reconstruct(e.to_string()))?;
    let mut rng = ChaCha8Rng::seed_from_u64(lt_seed(block_id));
    let symbols = encoder
        .encode(&message, num_symbols, &mut rng)
        .map_err(|e| SyncError::Reconstruct(e.to_string()))?;

    // Balanced partition: the first `num_symbols % n` batches take one
    // extra symbol, so every batch is non-empty whenever M >= N.
    let quota = num_symbols / n;
    let extra = num_symbols % n;
    let mut batches = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let end = start + quota + usize::from(i < extra);
        batches.push(encode_lt_batch(k as u32, bytes.len() as u64, &symbols[start..end]));
        start = end;
    }
    Ok(batches)
}

/// Serialize one LT batch: `message_len:u32 payload_len:u64 symbols`.
pub(crate) fn encode_lt_batch(
    message_len: u32,
    payload_len: u64,
    symbols: &[EncodedSymbol],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(LT_BATCH_HEADER + symbols.len() * 16);
    out.extend_from_slice(&message_len.to_le_bytes());
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.extend_from_slice(&encode_symbol_batch(symbols));
    out
}

/// Parsed LT batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LtBatch {
    pub message_len: u32,
    pub payload_len: u64,
    pub symbols: Vec<EncodedSymbol>,
}

pub(crate) fn decode_lt_batch(bytes: &[u8]) -> Result<LtBatch, SyncError> {
    if bytes.len() < LT_BATCH_HEADER {
        return Err(SyncError::Reconstruct("truncated LT batch".into()));
    }
    let message_len = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let payload_len = u64::from_le_bytes(bytes[4..12].try_into().unwrap());
    let symbols = decode_symbol_batch(&bytes[LT_BATCH_HEADER..])
        .map_err(|e| SyncError::Reconstruct(e.to_string()))?;
    Ok(LtBatch {
        message_len,
        payload_len,
        symbols,
    })
}
