//! Node roles for Byzantine-tolerant block recovery.
//!
//! A node plays two parts at once: it answers chunk requests from lagging
//! peers (the responder) and, when it has itself fallen behind, it runs a
//! recovery session pulling chunks from up to N−1 peers, at most f of which
//! may be faulty (the coordinator).
//!
//! # Session state machine
//!
//! ```text
//! Idle ──► Fanout ──► Collecting ──► Reconstructing ──► Done
//!                        │                  │
//!                        └──────────────────┴──────────► Failed
//! ```
//!
//! - **Fanout**: N−1 chunk requests enqueued (chunk i for peer i), bounded
//!   by the admission semaphore so aggregate ingress stays under the
//!   modelled downlink.
//! - **Collecting**: responses verified against the commitment delivered in
//!   the same message, then inserted into the chunk table. Failed peers are
//!   blacklisted and their chunk retried on a uniformly-chosen replacement.
//! - **Reconstructing**: entered the first time enough verified chunks are
//!   present (K for RS, a decodable symbol set for LT, a 2f+1-attested block
//!   for whole-block). Outstanding tasks observe the cancellation token;
//!   late arrivals are discarded.
//!
//! The chunk table and metrics share one mutex with O(1) critical sections;
//! the peer arena has its own; the two are never held at the same time.

mod chunkset;
mod config;
mod coordinator;
mod error;
mod metrics;
mod node;
mod peers;
mod responder;

pub use chunkset::ChunkSet;
pub use config::{LtParams, ProtocolConfig, SyncMode};
pub use coordinator::{RecoveryCoordinator, SessionOutcome, SessionReport};
pub use error::{ErrorKind, SyncError};
pub use metrics::SyncMetrics;
pub use node::{Behavior, Node, NodeHandle};
pub use peers::{PeerState, PeerTable};
