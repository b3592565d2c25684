//! The message envelope and its request/response payloads.

use blocksync_commitment::InclusionProof;
use serde::{Deserialize, Serialize};

/// One wire message between two peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "From")]
    pub from: i32,
    #[serde(rename = "To")]
    pub to: i32,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn request(from: i32, to: i32, request: ChunkRequest) -> Self {
        Self {
            from,
            to,
            payload: Payload::Request(request),
        }
    }

    pub fn response(from: i32, to: i32, response: ChunkResponse) -> Self {
        Self {
            from,
            to,
            payload: Payload::Response(response),
        }
    }

    /// Serialize to the canonical wire bytes.
    pub fn to_wire(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("envelope serialization cannot fail")
    }

    /// Parse one frame's bytes into an envelope, validating the type tag.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// The typed `Content` of an envelope, tagged by `Type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Content")]
pub enum Payload {
    #[serde(rename = "request")]
    Request(ChunkRequest),
    #[serde(rename = "response")]
    Response(ChunkResponse),
    /// Final response of a multi-response exchange.
    #[serde(rename = "last_response")]
    LastResponse(ChunkResponse),
}

/// A request for one chunk of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRequest {
    /// Requesting node.
    #[serde(rename = "NodeID")]
    pub node_id: i32,
    /// Block being recovered.
    #[serde(rename = "BlockID")]
    pub block_id: i64,
    /// Index of the chunk wanted from this peer.
    #[serde(rename = "ChunkID")]
    pub chunk_id: i32,
}

/// A chunk plus the commitment that binds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResponse {
    /// Responding node.
    #[serde(rename = "NodeID")]
    pub node_id: i32,
    #[serde(rename = "ChunkID")]
    pub chunk_id: i32,
    #[serde(rename = "Chunk")]
    pub chunk: WireChunk,
    /// Vector commitment root (or the block hash in whole-block mode).
    #[serde(rename = "Commitment", with = "b64")]
    pub commitment: Vec<u8>,
}

/// Chunk bytes with their inclusion proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChunk {
    #[serde(rename = "Data", with = "b64")]
    pub data: Vec<u8>,
    #[serde(rename = "Proof")]
    pub proof: WireProof,
}

/// Inclusion proof siblings, bottom→top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireProof {
    #[serde(rename = "Siblings", with = "b64_list")]
    pub siblings: Vec<[u8; 32]>,
}

impl WireProof {
    /// Rebuild the typed proof for a given chunk index.
    pub fn to_inclusion_proof(&self, index: u32) -> InclusionProof {
        InclusionProof {
            index,
            siblings: self.siblings.clone(),
        }
    }
}

impl From<&InclusionProof> for WireProof {
    fn from(proof: &InclusionProof) -> Self {
        Self {
            siblings: proof.siblings.clone(),
        }
    }
}

/// Base64 (standard alphabet) serde adapter for byte vectors.
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Base64 adapter for lists of 32-byte digests.
mod b64_list {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        items: &[[u8; 32]],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(items.iter().map(|b| STANDARD.encode(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<[u8; 32]>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                let bytes = STANDARD.decode(s).map_err(serde::de::Error::custom)?;
                <[u8; 32]>::try_from(bytes.as_slice())
                    .map_err(|_| serde::de::Error::custom("sibling is not 32 bytes"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_field_names() {
        let env = Envelope::request(
            0,
            3,
            ChunkRequest {
                node_id: 0,
                block_id: 42,
                chunk_id: 3,
            },
        );
        let json: serde_json::Value = serde_json::from_slice(&env.to_wire()).unwrap();
        assert_eq!(json["From"], 0);
        assert_eq!(json["To"], 3);
        assert_eq!(json["Type"], "request");
        assert_eq!(json["Content"]["NodeID"], 0);
        assert_eq!(json["Content"]["BlockID"], 42);
        assert_eq!(json["Content"]["ChunkID"], 3);
    }

    #[test]
    fn test_response_roundtrip() {
        let env = Envelope::response(
            5,
            0,
            ChunkResponse {
                node_id: 5,
                chunk_id: 5,
                chunk: WireChunk {
                    data: vec![1, 2, 3, 255],
                    proof: WireProof {
                        siblings: vec![[7u8; 32], [9u8; 32]],
                    },
                },
                commitment: vec![0xab; 32],
            },
        );
        let parsed = Envelope::from_wire(&env.to_wire()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = br#"{"From":1,"To":2,"Type":"gossip","Content":{}}"#;
        assert!(Envelope::from_wire(raw).is_err());
    }

    #[test]
    fn test_last_response_tag() {
        let env = Envelope {
            from: 2,
            to: 0,
            payload: Payload::LastResponse(ChunkResponse {
                node_id: 2,
                chunk_id: 0,
                chunk: WireChunk {
                    data: vec![],
                    proof: WireProof::default(),
                },
                commitment: vec![],
            }),
        };
        let json: serde_json::Value = serde_json::from_slice(&env.to_wire()).unwrap();
        assert_eq!(json["Type"], "last_response");
        assert_eq!(Envelope::from_wire(&env.to_wire()).unwrap(), env);
    }
}
