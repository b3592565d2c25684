//! Error taxonomy for recovery sessions.

use blocksync_net::SessionError;
use thiserror::Error;

/// Why a session (or a single peer exchange) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Connect/read/write failure or EOF before a complete message.
    #[error("transport: {0}")]
    Transport(String),
    /// Malformed JSON or unbalanced braces.
    #[error("framing: {0}")]
    Framing(String),
    /// Commitment root mismatch, inconsistent siblings, or chunk bytes that
    /// do not hash to the claimed leaf.
    #[error("inclusion proof verification failed")]
    ProofVerify,
    /// Peers disagree on the commitment for the same block.
    #[error("commitment conflict across peers")]
    CommitmentConflict,
    /// RS reconstruction came up short or the LT decoder stalled.
    #[error("reconstruction failed: {0}")]
    Reconstruct(String),
    /// Fewer than K responsive, non-blacklisted peers remain.
    #[error("insufficient peers")]
    InsufficientPeers,
    /// Session or per-request deadline exceeded.
    #[error("deadline exceeded")]
    Timeout,
}

/// Compact failure classification stored per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Framing,
    ProofVerify,
    CommitmentConflict,
    Timeout,
}

impl SyncError {
    /// The per-peer classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transport(_) => ErrorKind::Transport,
            SyncError::Framing(_) => ErrorKind::Framing,
            SyncError::ProofVerify => ErrorKind::ProofVerify,
            SyncError::CommitmentConflict => ErrorKind::CommitmentConflict,
            SyncError::Timeout => ErrorKind::Timeout,
            // Session-level outcomes; not attributed to one peer.
            SyncError::Reconstruct(_) | SyncError::InsufficientPeers => ErrorKind::Transport,
        }
    }
}

impl From<SessionError> for SyncError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Deadline(_) => SyncError::Timeout,
            SessionError::Framing(err) => SyncError::Framing(err.to_string()),
            SessionError::Decode(err) => SyncError::Framing(err.to_string()),
            SessionError::Connect { .. } | SessionError::Io(_) | SessionError::Eof => {
                SyncError::Transport(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_mapping() {
        assert_eq!(
            SyncError::from(SessionError::Eof).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            SyncError::from(SessionError::Deadline(std::time::Duration::from_secs(20))),
            SyncError::Timeout
        );
    }
}
