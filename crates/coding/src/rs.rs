//! Systematic (K, N−K) Reed–Solomon erasure coding over GF(2^8).
//!
//! `split` produces K equal-size data shards (zero-padded tail), `encode`
//! fills the N−K parity shards, `reconstruct` recovers missing shards from
//! any K survivors, and `join` reassembles the original bytes.

use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

/// Errors from the RS codec.
#[derive(Debug, Error)]
pub enum RsError {
    #[error("invalid shard geometry: k={k}, n={n}")]
    BadGeometry { k: usize, n: usize },
    #[error("cannot split empty data")]
    EmptyData,
    #[error("too few shards to reconstruct: have {have}, need {need}")]
    TooFewShards { have: usize, need: usize },
    #[error("shard size mismatch")]
    ShardSizeMismatch,
    #[error("reed-solomon failure: {0}")]
    Backend(reed_solomon_erasure::Error),
}

impl From<reed_solomon_erasure::Error> for RsError {
    fn from(e: reed_solomon_erasure::Error) -> Self {
        match e {
            reed_solomon_erasure::Error::TooFewShardsPresent => RsError::TooFewShards {
                have: 0,
                need: 0,
            },
            reed_solomon_erasure::Error::IncorrectShardSize => RsError::ShardSizeMismatch,
            other => RsError::Backend(other),
        }
    }
}

/// A (K data, N total) systematic Reed–Solomon codec.
#[derive(Debug, Clone)]
pub struct RsCodec {
    k: usize,
    n: usize,
}

impl RsCodec {
    /// Create a codec with `k` data shards out of `n` total.
    pub fn new(k: usize, n: usize) -> Result<Self, RsError> {
        if k == 0 || n <= k {
            return Err(RsError::BadGeometry { k, n });
        }
        Ok(Self { k, n })
    }

    pub fn data_shards(&self) -> usize {
        self.k
    }

    pub fn total_shards(&self) -> usize {
        self.n
    }

    /// Shard size for a payload of `len` bytes: ⌈len / K⌉.
    pub fn shard_size(&self, len: usize) -> usize {
        len.div_ceil(self.k)
    }

    fn backend(&self) -> Result<ReedSolomon, RsError> {
        ReedSolomon::new(self.k, self.n - self.k).map_err(RsError::from)
    }

    /// Split `data` into K equal-size shards, zero-padding the last.
    ///
    /// Returns the shards and the original byte length (needed by
    /// [`RsCodec::join`] to strip the padding again).
    pub fn split(&self, data: &[u8]) -> Result<(Vec<Vec<u8>>, usize), RsError> {
        if data.is_empty() {
            return Err(RsError::EmptyData);
        }
        let shard_size = self.shard_size(data.len());
        let mut shards = Vec::with_capacity(self.k);
        for i in 0..self.k {
            let start = (i * shard_size).min(data.len());
            let end = ((i + 1) * shard_size).min(data.len());
            let mut shard = data[start..end].to_vec();
            shard.resize(shard_size, 0);
            shards.push(shard);
        }
        Ok((shards, data.len()))
    }

    /// Extend K data shards with N−K parity shards.
    pub fn encode(&self, data_shards: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, RsError> {
        if data_shards.len() != self.k {
            return Err(RsError::ShardSizeMismatch);
        }
        let shard_size = data_shards.first().map(|s| s.len()).unwrap_or(0);
        let mut shards = data_shards;
        shards.resize(self.n, vec![0u8; shard_size]);
        self.backend()?.encode(&mut shards)?;
        Ok(shards)
    }

    /// Recover every missing shard in place, given at least K present.
    ///
    /// `shards[i]` is `None` for a missing shard; on success all N entries
    /// are `Some`.
    pub fn reconstruct(&self, shards: &mut Vec<Option<Vec<u8>>>) -> Result<(), RsError> {
        let present = shards.iter().filter(|s| s.is_some()).count();
        if present < self.k {
            return Err(RsError::TooFewShards {
                have: present,
                need: self.k,
            });
        }
        self.backend()?.reconstruct(shards)?;
        Ok(())
    }

    /// Reassemble the original bytes from the K data shards.
    pub fn join(&self, shards: &[Vec<u8>], original_len: usize) -> Result<Vec<u8>, RsError> {
        if shards.len() < self.k {
            return Err(RsError::TooFewShards {
                have: shards.len(),
                need: self.k,
            });
        }
        let mut out = Vec::with_capacity(original_len);
        for shard in shards.iter().take(self.k) {
            out.extend_from_slice(shard);
        }
        if out.len() < original_len {
            return Err(RsError::ShardSizeMismatch);
        }
        out.truncate(original_len);
        Ok(out)
    }
}

/// Strip trailing zero padding from reassembled bytes.
///
/// Used by receivers that do not know the original length; valid because the
/// canonical block encoding never ends in a NUL byte.
pub fn strip_zero_padding(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 + 1).collect()
    }

    #[test]
    fn test_split_pads_last_shard() {
        let codec = RsCodec::new(4, 6).unwrap();
        let data = payload(10);
        let (shards, len) = codec.split(&data).unwrap();
        assert_eq!(len, 10);
        assert_eq!(shards.len(), 4);
        // ceil(10/4) = 3 bytes per shard, last shard is 1 data byte + padding.
        assert!(shards.iter().all(|s| s.len() == 3));
        assert_eq!(&shards[3][..], &[data[9], 0, 0]);
    }

    #[test]
    fn test_roundtrip_without_loss() {
        let codec = RsCodec::new(6, 10).unwrap();
        let data = payload(997);
        let (shards, len) = codec.split(&data).unwrap();
        let encoded = codec.encode(shards).unwrap();
        assert_eq!(encoded.len(), 10);
        let joined = codec.join(&encoded[..6], len).unwrap();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_reconstruct_from_any_k_shards() {
        // Drop shards {2, 5, 7} from a (10, 6) encoding of 1024 bytes and
        // rebuild from the remaining 7.
        let codec = RsCodec::new(6, 10).unwrap();
        let data = payload(1024);
        let (shards, len) = codec.split(&data).unwrap();
        let encoded = codec.encode(shards).unwrap();

        let mut partial: Vec<Option<Vec<u8>>> = encoded.into_iter().map(Some).collect();
        for dropped in [2, 5, 7] {
            partial[dropped] = None;
        }
        codec.reconstruct(&mut partial).unwrap();

        let recovered: Vec<Vec<u8>> = partial.into_iter().map(|s| s.unwrap()).collect();
        let joined = codec.join(&recovered[..6], len).unwrap();
        assert_eq!(joined, data);
    }

    #[test]
    fn test_reconstruct_rejects_too_few() {
        let codec = RsCodec::new(6, 10).unwrap();
        let data = payload(64);
        let (shards, _) = codec.split(&data).unwrap();
        let encoded = codec.encode(shards).unwrap();

        let mut partial: Vec<Option<Vec<u8>>> = encoded.into_iter().map(Some).collect();
        for dropped in [0, 1, 2, 3, 4] {
            partial[dropped] = None;
        }
        assert!(matches!(
            codec.reconstruct(&mut partial),
            Err(RsError::TooFewShards { have: 5, need: 6 })
        ));
    }

    #[test]
    fn test_bad_geometry_rejected() {
        assert!(RsCodec::new(0, 4).is_err());
        assert!(RsCodec::new(4, 4).is_err());
        assert!(RsCodec::new(5, 4).is_err());
    }

    #[test]
    fn test_strip_zero_padding() {
        assert_eq!(strip_zero_padding(vec![1, 2, 0, 3, 0, 0]), vec![1, 2, 0, 3]);
        assert_eq!(strip_zero_padding(vec![0, 0]), Vec::<u8>::new());
    }
}
