//! Wire messages for the chunk recovery protocol.
//!
//! The wire format is line-delimited JSON objects, one logical message per
//! balanced `{…}` (no length prefix — a compatibility constraint):
//!
//! ```text
//! {"From": int, "To": int, "Type": "request"|"response"|"last_response",
//!  "Content": <ChunkRequest | ChunkResponse>}
//! ```
//!
//! [`Payload`] is the tagged sum the dynamically-typed `Content` field
//! decodes into; the `Type` tag is validated strictly — an unknown tag is a
//! decode error, not a silently ignored message.

mod envelope;
mod framing;

pub use envelope::{ChunkRequest, ChunkResponse, Envelope, Payload, WireChunk, WireProof};
pub use framing::{FrameAccumulator, FramingError};
