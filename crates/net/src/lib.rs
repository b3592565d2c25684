//! Transport layer: simulated network conditions and the per-peer session.
//!
//! - [`NetworkProfile`]: fixed propagation delay plus bandwidth-proportional
//!   transfer time, applied as sleeps on both directions of every transfer
//! - [`PeerSession`]: one outbound TCP connection to one peer — write the
//!   request once, then run a framed read loop under a read deadline
//!
//! All realism knobs live in the profile; the session itself is plain TCP
//! with JSON framing.

mod session;
mod sim;

pub use session::{PeerSession, SessionError, DEFAULT_BUFFER_SIZE, DEFAULT_READ_DEADLINE};
pub use sim::NetworkProfile;
