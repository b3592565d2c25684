//! LT-encoded symbols and their byte codec.
//!
//! An [`EncodedSymbol`] is a degree-d XOR-sum over Z_p together with the set
//! of message positions it covers. Batches of symbols travel inside chunk
//! payloads, so they need a deterministic byte form that can serve as a
//! Merkle leaf.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An LT-coded symbol: a field value plus the message positions it sums.
///
/// `positions` is kept sorted; the decoder mutates it during peeling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSymbol {
    /// Field element, always `< p`.
    pub value: u64,
    /// Sorted message positions in `[0, K)`.
    pub positions: Vec<u32>,
}

impl EncodedSymbol {
    pub fn new(value: u64, mut positions: Vec<u32>) -> Self {
        positions.sort_unstable();
        Self { value, positions }
    }

    /// Current degree of the symbol.
    pub fn degree(&self) -> usize {
        self.positions.len()
    }
}

/// Errors from the symbol-batch byte codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolCodecError {
    #[error("truncated symbol batch")]
    Truncated,
    #[error("symbol batch length {0} exceeds limit")]
    Oversized(u32),
}

/// Hard cap on symbols per batch; a batch never carries more than one
/// block's worth of symbols.
const MAX_BATCH_LEN: u32 = 1 << 24;

/// Serialize a batch of symbols into a deterministic little-endian form.
///
/// Layout: `count:u32 (value:u64 position_count:u32 position:u32*)*`
pub fn encode_symbol_batch(symbols: &[EncodedSymbol]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + symbols.len() * 16);
    out.extend_from_slice(&(symbols.len() as u32).to_le_bytes());
    for s in symbols {
        out.extend_from_slice(&s.value.to_le_bytes());
        out.extend_from_slice(&(s.positions.len() as u32).to_le_bytes());
        for p in &s.positions {
            out.extend_from_slice(&p.to_le_bytes());
        }
    }
    out
}

/// Parse a batch previously produced by [`encode_symbol_batch`].
pub fn decode_symbol_batch(bytes: &[u8]) -> Result<Vec<EncodedSymbol>, SymbolCodecError> {
    let mut cursor = bytes;

    let count = read_u32(&mut cursor)?;
    if count > MAX_BATCH_LEN {
        return Err(SymbolCodecError::Oversized(count));
    }

    let mut symbols = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let value = read_u64(&mut cursor)?;
        let degree = read_u32(&mut cursor)?;
        if degree > MAX_BATCH_LEN {
            return Err(SymbolCodecError::Oversized(degree));
        }
        let mut positions = Vec::with_capacity(degree as usize);
        for _ in 0..degree {
            positions.push(read_u32(&mut cursor)?);
        }
        symbols.push(EncodedSymbol { value, positions });
    }
    Ok(symbols)
}

fn read_u32(cursor: &mut &[u8]) -> Result<u32, SymbolCodecError> {
    if cursor.len() < 4 {
        return Err(SymbolCodecError::Truncated);
    }
    let (head, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(u32::from_le_bytes(head.try_into().unwrap()))
}

fn read_u64(cursor: &mut &[u8]) -> Result<u64, SymbolCodecError> {
    if cursor.len() < 8 {
        return Err(SymbolCodecError::Truncated);
    }
    let (head, rest) = cursor.split_at(8);
    *cursor = rest;
    Ok(u64::from_le_bytes(head.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_roundtrip() {
        let symbols = vec![
            EncodedSymbol::new(5, vec![2, 0, 7]),
            EncodedSymbol::new(0, vec![1]),
            EncodedSymbol::new(u64::MAX - 3, vec![]),
        ];
        let bytes = encode_symbol_batch(&symbols);
        let parsed = decode_symbol_batch(&bytes).unwrap();
        // Positions were sorted by the constructor.
        assert_eq!(parsed[0].positions, vec![0, 2, 7]);
        assert_eq!(parsed, {
            let mut s = symbols.clone();
            s[0].positions.sort_unstable();
            s
        });
    }

    #[test]
    fn test_truncated_batch_rejected() {
        let bytes = encode_symbol_batch(&[EncodedSymbol::new(9, vec![1, 2])]);
        for cut in 1..bytes.len() {
            assert_eq!(
                decode_symbol_batch(&bytes[..cut]),
                Err(SymbolCodecError::Truncated),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_oversized_count_rejected() {
        let bytes = u32::MAX.to_le_bytes().to_vec();
        assert!(matches!(
            decode_symbol_batch(&bytes),
            Err(SymbolCodecError::Oversized(_))
        ));
    }
}
