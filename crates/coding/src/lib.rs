//! Coding layer: prime-field arithmetic, soliton distributions, and the two
//! erasure codes the testbed compares.
//!
//! - [`field`]: Z_p operations used by the LT code
//! - [`soliton`]: ideal and robust soliton degree distributions with a
//!   deterministic inverse-CDF sampler
//! - [`lt`]: rateless Luby-transform encoder and peeling decoder
//! - [`rs`]: systematic (K, N−K) Reed–Solomon over GF(2^8) with shard
//!   split/join helpers
//!
//! Everything in this crate is pure CPU work; no I/O, no async.

pub mod field;
pub mod lt;
pub mod rs;
pub mod soliton;

pub use field::{PrimeField, LT_FIELD_PRIME};
pub use lt::{LtDecodeError, LtEncoder, LtError};
pub use rs::{RsCodec, RsError};
pub use soliton::{ideal_soliton, RobustSoliton, SolitonError};
