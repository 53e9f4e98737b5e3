//! Chunk wire format and fragmentation.
//!
//! A message larger than one datagram is split into chunks, each sent as a
//! single datagram ending in a continuation marker byte.
//!
//! Marker framing (default, one datagram per chunk):
//!
//! ```text
//! +---------------------------+--------+
//! | payload                   | marker |
//! | 0..=packet_size-1 bytes   | 1 byte |
//! +---------------------------+--------+
//! ```
//!
//! Sequenced framing adds a header so chunks can be reordered and
//! deduplicated on receipt:
//!
//! ```text
//! +------------+---------+---------+---------+--------+
//! | message_id |  index  | crc32c  | payload | marker |
//! |  4 bytes   | 4 bytes | 4 bytes |         | 1 byte |
//! +------------+---------+---------+---------+--------+
//! ```
//!
//! The marker is `0x01` on the final chunk of a message and `0x00` otherwise.

use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum datagram size on the link.
pub const PACKET_SIZE: usize = 1024;

/// Size of the trailing continuation marker.
pub const MARKER_SIZE: usize = 1;

/// Payload bytes per chunk under marker framing.
pub const MAX_CHUNK_PAYLOAD: usize = PACKET_SIZE - MARKER_SIZE;

/// Size of the sequenced framing header (message id + index + crc32c).
pub const SEQUENCED_HEADER_SIZE: usize = 12;

/// Marker value: more chunks follow.
pub const MORE_FOLLOWS: u8 = 0x00;

/// Marker value: last chunk of the message.
pub const LAST_CHUNK: u8 = 0x01;

/// How chunks are laid out on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Payload followed by the marker byte; reassembled in arrival order.
    #[default]
    Marker,
    /// Header with message id, chunk index and checksum; reassembled by index.
    Sequenced,
}

impl Framing {
    /// Bytes of framing overhead per datagram.
    pub fn overhead(&self) -> usize {
        match self {
            Framing::Marker => MARKER_SIZE,
            Framing::Sequenced => SEQUENCED_HEADER_SIZE + MARKER_SIZE,
        }
    }

    /// Returns the per-chunk payload budget for the given packet size.
    pub fn max_payload(&self, packet_size: usize) -> Result<usize, ProtocolError> {
        let min = self.overhead() + 1;
        if packet_size < min {
            return Err(ProtocolError::PacketTooSmall {
                size: packet_size,
                min,
            });
        }
        Ok(packet_size - self.overhead())
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Marker => write!(f, "marker"),
            Framing::Sequenced => write!(f, "sequenced"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "marker" => Ok(Framing::Marker),
            "sequenced" => Ok(Framing::Sequenced),
            other => Err(format!("unknown framing: {other}")),
        }
    }
}

/// One fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Message this chunk belongs to (always 0 under marker framing).
    pub message_id: u32,
    /// Position within the message (always 0 on decode under marker framing).
    pub index: u32,
    /// Payload bytes.
    pub payload: Bytes,
    /// Whether this is the final chunk of the message.
    pub is_last: bool,
}

impl Chunk {
    /// Returns the continuation marker byte for this chunk.
    pub fn marker(&self) -> u8 {
        if self.is_last {
            LAST_CHUNK
        } else {
            MORE_FOLLOWS
        }
    }

    /// Encodes the chunk into a single datagram.
    pub fn encode(&self, framing: Framing) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + framing.overhead());

        if framing == Framing::Sequenced {
            buf.put_u32(self.message_id);
            buf.put_u32(self.index);
            buf.put_u32(crc32c::crc32c(&self.payload));
        }

        buf.put_slice(&self.payload);
        buf.put_u8(self.marker());
        buf.freeze()
    }

    /// Decodes a chunk from a received datagram.
    pub fn decode(framing: Framing, datagram: &[u8]) -> Result<Self, ProtocolError> {
        let (&marker, body) = datagram.split_last().ok_or(ProtocolError::MissingMarker)?;
        let is_last = match marker {
            LAST_CHUNK => true,
            MORE_FOLLOWS => false,
            other => return Err(ProtocolError::InvalidMarker(other)),
        };

        match framing {
            Framing::Marker => Ok(Self {
                message_id: 0,
                index: 0,
                payload: Bytes::copy_from_slice(body),
                is_last,
            }),
            Framing::Sequenced => {
                if body.len() < SEQUENCED_HEADER_SIZE {
                    return Err(ProtocolError::TruncatedChunk {
                        len: datagram.len(),
                        min: framing.overhead(),
                    });
                }

                let message_id = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let index = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                let expected = u32::from_be_bytes([body[8], body[9], body[10], body[11]]);
                let payload = &body[SEQUENCED_HEADER_SIZE..];

                let actual = crc32c::crc32c(payload);
                if actual != expected {
                    return Err(ProtocolError::CrcMismatch { expected, actual });
                }

                Ok(Self {
                    message_id,
                    index,
                    payload: Bytes::copy_from_slice(payload),
                    is_last,
                })
            }
        }
    }
}

/// Splits messages into chunks that fit one datagram each.
#[derive(Debug, Clone, Copy)]
pub struct Fragmenter {
    framing: Framing,
    max_payload: usize,
}

impl Fragmenter {
    /// Creates a fragmenter for the given framing and link packet size.
    pub fn new(framing: Framing, packet_size: usize) -> Result<Self, ProtocolError> {
        Ok(Self {
            framing,
            max_payload: framing.max_payload(packet_size)?,
        })
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Number of chunks a message of `len` bytes produces.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_payload).max(1)
    }

    /// Splits `message` into ordered chunks. Only the final chunk is marked
    /// last; an empty message yields a single empty last chunk.
    pub fn fragment(&self, message_id: u32, message: &[u8]) -> Vec<Chunk> {
        let data = Bytes::copy_from_slice(message);
        let count = self.chunk_count(data.len());

        (0..count)
            .map(|i| {
                let start = i * self.max_payload;
                let end = (start + self.max_payload).min(data.len());
                Chunk {
                    message_id,
                    index: i as u32,
                    payload: data.slice(start..end),
                    is_last: i + 1 == count,
                }
            })
            .collect()
    }
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self {
            framing: Framing::Marker,
            max_payload: MAX_CHUNK_PAYLOAD,
        }
    }
}
