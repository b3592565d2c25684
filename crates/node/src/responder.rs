//! Responder: serves chunk requests from lagging peers.
//!
//! On each request the responder regenerates the target block
//! deterministically, chunks it per the configured mode, computes the vector
//! commitment, and replies with the requested chunk, its inclusion proof,
//! and the commitment root. Chunk sets are cached per block for the lifetime
//! of the process; peers ask for different indices of the same set.
//!
//! A Byzantine responder in the experiment fault model simply never replies
//! (silent omission). Two additional behaviors exist so tests can exercise
//! the mandatory verification paths: `Tamper` flips a payload byte and
//! `WrongBlock` serves a self-consistent commitment over different content.

use crate::chunkset::ChunkSet;
use crate::config::ProtocolConfig;
use crate::node::Behavior;
use blocksync_messages::{ChunkResponse, Envelope, FrameAccumulator, Payload, WireChunk, WireProof};
use blocksync_types::{BlockId, PeerId};
use blocksync_workload::block_for;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Request-serving half of a node.
pub(crate) struct Responder {
    node_id: PeerId,
    config: ProtocolConfig,
    behavior: Behavior,
    cache: Mutex<HashMap<BlockId, Arc<ChunkSet>>>,
}

impl Responder {
    pub fn new(node_id: PeerId, config: ProtocolConfig, behavior: Behavior) -> Self {
        Self {
            node_id,
            config,
            behavior,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Accept loop; runs until the task is aborted.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    tracing::debug!(node = %self.node_id, %remote, "connection accepted");
                    let responder = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = responder.handle_connection(stream).await {
                            tracing::debug!(node = %responder.node_id, %err, "connection ended");
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!(node = %self.node_id, %err, "accept failed");
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let mut acc = FrameAccumulator::default();
        let mut buf = vec![0u8; self.config.buffer_size.max(1)];

        loop {
            let frame = loop {
                match acc.next_frame() {
                    Ok(Some(frame)) => break frame,
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(node = %self.node_id, %err, "dropping unframable connection");
                        return Ok(());
                    }
                }
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Ok(());
                }
                acc.push(&buf[..n]);
            };

            let envelope = match Envelope::from_wire(&frame) {
                Ok(env) => env,
                Err(err) => {
                    tracing::warn!(node = %self.node_id, %err, "undecodable message");
                    continue;
                }
            };
            let Payload::Request(request) = envelope.payload else {
                tracing::warn!(node = %self.node_id, "ignoring non-request message");
                continue;
            };

            tracing::debug!(
                node = %self.node_id,
                from = request.node_id,
                block = request.block_id,
                chunk = request.chunk_id,
                "chunk request"
            );

            if self.behavior == Behavior::Silent {
                // Silent omission: hold the connection open, never answer.
                continue;
            }

            let Some(response) = self.build_response(&request) else {
                continue;
            };
            let envelope = Envelope::response(self.node_id.0 as i32, request.node_id, response);
            let bytes = envelope.to_wire();

            // Upload-side delay + bandwidth model.
            self.config.network.throttle(bytes.len()).await;
            stream.write_all(&bytes).await?;
            stream.flush().await?;
        }
    }

    fn build_response(
        &self,
        request: &blocksync_messages::ChunkRequest,
    ) -> Option<ChunkResponse> {
        let set = match self.prepare(BlockId(request.block_id)) {
            Ok(set) => set,
            Err(err) => {
                tracing::error!(node = %self.node_id, %err, "chunk set build failed");
                return None;
            }
        };
        let index = request.chunk_id;
        if index < 0 || index as usize >= set.chunk_count() {
            tracing::warn!(node = %self.node_id, chunk = index, "chunk index out of range");
            return None;
        }
        let mut data = set.chunks[index as usize].clone();
        if self.behavior == Behavior::Tamper {
            if let Some(last) = data.last_mut() {
                *last ^= 0x01;
            }
        }

        Some(ChunkResponse {
            node_id: self.node_id.0 as i32,
            chunk_id: index,
            chunk: WireChunk {
                data,
                proof: WireProof::from(&set.proofs[index as usize]),
            },
            commitment: set.commitment.root.as_bytes().to_vec(),
        })
    }

    /// Regenerate (or fetch from cache) the chunk set for a block.
    fn prepare(&self, block_id: BlockId) -> Result<Arc<ChunkSet>, crate::error::SyncError> {
        if let Some(set) = self.cache.lock().unwrap().get(&block_id) {
            return Ok(Arc::clone(set));
        }

        // A wrong-block responder commits to different content; the offset
        // keeps its chunk set internally consistent but root-incompatible.
        let effective_id = match self.behavior {
            Behavior::WrongBlock => BlockId(block_id.0 + 1_000_000),
            _ => block_id,
        };
        let block = block_for(effective_id, self.config.txns_per_block);
        let set = Arc::new(ChunkSet::build(&self.config, &block)?);
        self.cache
            .lock()
            .unwrap()
            .insert(block_id, Arc::clone(&set));
        Ok(set)
    }
}
