//! Rateless Luby-transform code over Z_p with peeling decode.
//!
//! The encoder draws a degree from the robust soliton, picks that many
//! distinct message positions, and sums them in the field. The decoder runs
//! the classic peeling process: a FIFO queue of degree-1 symbols releases one
//! message position at a time and substitutes it into every neighbour. The
//! queue discipline is FIFO so a fixed seed yields a reproducible trace.

use crate::field::PrimeField;
use crate::soliton::{RobustSoliton, SolitonError};
use blocksync_types::EncodedSymbol;
use rand::seq::index::sample;
use rand::Rng;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors constructing an LT encoder.
#[derive(Debug, Error, PartialEq)]
pub enum LtError {
    #[error(transparent)]
    Soliton(#[from] SolitonError),
    #[error("message symbol {value} is not reduced modulo {modulus}")]
    UnreducedSymbol { value: u64, modulus: u64 },
    #[error("field modulus {0} too small to pack block bytes")]
    FieldTooSmall(u64),
}

/// Decode failure: the peeling process stalled before recovering every
/// position.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("peeling decoder stalled with {unrecovered} of {k} positions unrecovered")]
pub struct LtDecodeError {
    pub k: usize,
    pub unrecovered: usize,
}

/// LT encoder for a fixed (k, field, distribution) tuple.
#[derive(Debug, Clone)]
pub struct LtEncoder {
    field: PrimeField,
    dist: RobustSoliton,
}

impl LtEncoder {
    /// Build an encoder for `k` input symbols with robust soliton
    /// parameters `c` and `delta`.
    pub fn new(k: usize, field: PrimeField, c: f64, delta: f64) -> Result<Self, LtError> {
        Ok(Self {
            field,
            dist: RobustSoliton::new(k, c, delta)?,
        })
    }

    /// The field this encoder sums in.
    pub fn field(&self) -> PrimeField {
        self.field
    }

    /// Encode `message` into `num_symbols` coded symbols.
    ///
    /// Every message value must already be reduced modulo p.
    pub fn encode<R: Rng + ?Sized>(
        &self,
        message: &[u64],
        num_symbols: usize,
        rng: &mut R,
    ) -> Result<Vec<EncodedSymbol>, LtError> {
        let k = self.dist.k();
        assert_eq!(message.len(), k, "message length must match encoder k");
        if let Some(&value) = message.iter().find(|&&v| v >= self.field.modulus()) {
            return Err(LtError::UnreducedSymbol {
                value,
                modulus: self.field.modulus(),
            });
        }

        let mut out = Vec::with_capacity(num_symbols);
        for _ in 0..num_symbols {
            let d = self.dist.sample(rng);
            let positions: Vec<u32> = sample(rng, k, d).into_iter().map(|p| p as u32).collect();
            let value = positions
                .iter()
                .fold(0u64, |acc, &p| self.field.add(acc, message[p as usize]));
            out.push(EncodedSymbol::new(value, positions));
        }
        Ok(out)
    }
}

/// Peeling decode: recover the `k` message symbols from coded symbols.
///
/// Returns the message, or [`LtDecodeError`] when the decoder stalls
/// (underdetermined symbol set). The set of unrecovered positions strictly
/// shrinks on every step that releases a symbol.
pub fn decode(
    symbols: &[EncodedSymbol],
    k: usize,
    field: PrimeField,
) -> Result<Vec<u64>, LtDecodeError> {
    let mut work: Vec<EncodedSymbol> = symbols.to_vec();
    let mut recovered: Vec<Option<u64>> = vec![None; k];
    let mut remaining = k;

    // Seed the queue with every degree-1 symbol, in arrival order.
    let mut queue: VecDeque<usize> = work
        .iter()
        .enumerate()
        .filter(|(_, s)| s.degree() == 1)
        .map(|(i, _)| i)
        .collect();

    while let Some(idx) = queue.pop_front() {
        if work[idx].degree() != 1 {
            continue;
        }
        let pos = work[idx].positions[0] as usize;
        if pos >= k || recovered[pos].is_some() {
            continue;
        }
        let value = work[idx].value;
        recovered[pos] = Some(value);
        remaining -= 1;
        if remaining == 0 {
            break;
        }

        // Substitute the released value into every other symbol covering it.
        for (other_idx, other) in work.iter_mut().enumerate() {
            if other_idx == idx {
                continue;
            }
            if let Ok(found) = other.positions.binary_search(&(pos as u32)) {
                other.value = field.sub(other.value, value);
                other.positions.remove(found);
                if other.degree() == 1 {
                    queue.push_back(other_idx);
                }
            }
        }
    }

    if remaining > 0 {
        tracing::debug!(k, unrecovered = remaining, "LT decode stalled");
        return Err(LtDecodeError {
            k,
            unrecovered: remaining,
        });
    }
    Ok(recovered.into_iter().map(|v| v.unwrap()).collect())
}

/// Pack block bytes into field elements, `packed_bytes` per element,
/// little-endian, zero-padding the tail.
///
/// Fails for fields too small to hold a whole byte.
pub fn symbols_from_bytes(data: &[u8], field: PrimeField) -> Result<Vec<u64>, LtError> {
    let width = field.packed_bytes();
    if width == 0 {
        return Err(LtError::FieldTooSmall(field.modulus()));
    }
    let mut out = Vec::with_capacity(data.len().div_ceil(width));
    for group in data.chunks(width) {
        let mut buf = [0u8; 8];
        buf[..group.len()].copy_from_slice(group);
        out.push(u64::from_le_bytes(buf));
    }
    Ok(out)
}

/// Inverse of [`symbols_from_bytes`]: unpack field elements back into
/// `original_len` bytes.
pub fn bytes_from_symbols(
    symbols: &[u64],
    field: PrimeField,
    original_len: usize,
) -> Result<Vec<u8>, LtError> {
    let width = field.packed_bytes();
    if width == 0 {
        return Err(LtError::FieldTooSmall(field.modulus()));
    }
    let mut out = Vec::with_capacity(symbols.len() * width);
    for &s in symbols {
        out.extend_from_slice(&s.to_le_bytes()[..width]);
    }
    out.truncate(original_len);
    Ok(out)
}
