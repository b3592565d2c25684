//! Requester-side peer session.
//!
//! One session owns one outbound TCP connection: serialize the request
//! envelope, write it once, then loop reading into a frame accumulator and
//! dispatching each complete object. A read deadline bounds every wait so a
//! silent peer costs at most the deadline.

use blocksync_messages::{Envelope, FrameAccumulator, FramingError};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Per-request read deadline.
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(20);

/// Default read buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 65536;

/// Session failures, each mapping onto the protocol error taxonomy.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer closed the connection before a complete message")]
    Eof,
    #[error("read deadline of {0:?} exceeded")]
    Deadline(Duration),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("message decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// An open request/response exchange with a single peer.
pub struct PeerSession {
    stream: TcpStream,
    peer: SocketAddr,
    acc: FrameAccumulator,
    read_deadline: Duration,
    buf: Vec<u8>,
}

impl PeerSession {
    /// Dial `addr`. The connect attempt itself runs under the read deadline.
    pub async fn connect(addr: SocketAddr, read_deadline: Duration) -> Result<Self, SessionError> {
        Self::connect_with_buffer(addr, read_deadline, DEFAULT_BUFFER_SIZE).await
    }

    /// [`PeerSession::connect`] with an explicit read buffer size.
    pub async fn connect_with_buffer(
        addr: SocketAddr,
        read_deadline: Duration,
        buffer_size: usize,
    ) -> Result<Self, SessionError> {
        let stream = timeout(read_deadline, TcpStream::connect(addr))
            .await
            .map_err(|_| SessionError::Deadline(read_deadline))?
            .map_err(|source| SessionError::Connect { addr, source })?;
        Ok(Self {
            stream,
            peer: addr,
            acc: FrameAccumulator::default(),
            read_deadline,
            buf: vec![0u8; buffer_size.max(1)],
        })
    }

    /// The address this session is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Serialize and write one envelope.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), SessionError> {
        let bytes = envelope.to_wire();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read until the next complete message arrives, parse it, return it.
    ///
    /// Every socket read is bounded by the read deadline; an EOF before a
    /// complete frame is an error.
    pub async fn next_message(&mut self) -> Result<Envelope, SessionError> {
        loop {
            if let Some(frame) = self.acc.next_frame()? {
                let envelope = Envelope::from_wire(&frame)?;
                tracing::trace!(peer = %self.peer, bytes = frame.len(), "message received");
                return Ok(envelope);
            }

            let n = timeout(self.read_deadline, self.stream.read(&mut self.buf))
                .await
                .map_err(|_| SessionError::Deadline(self.read_deadline))??;
            if n == 0 {
                return Err(SessionError::Eof);
            }
            self.acc.push(&self.buf[..n]);
        }
    }
}
