//! Message reassembly from received chunks.

use crate::chunk::{Chunk, Framing};
use crate::error::ProtocolError;
use crate::MAX_MESSAGE_SIZE;
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;

/// Rebuilds messages from a stream of chunks.
///
/// Under marker framing payloads are concatenated in arrival order and the
/// first last-marked chunk completes the message. Under sequenced framing
/// chunks are buffered by index, duplicates are ignored, and the message
/// completes once every index up to the last one is present. Chunks of the
/// most recently completed message are dropped, so a duplicated datagram
/// never delivers its message twice.
///
/// Only the final chunk of a message may be empty. Every buffered chunk
/// therefore carries at least one byte and the size limit also bounds the
/// number of chunks held.
#[derive(Debug)]
pub struct Reassembler {
    framing: Framing,
    max_message_size: usize,
    /// Payload received so far (marker framing only).
    partial: BytesMut,
    /// Message currently being assembled (sequenced framing only).
    message_id: Option<u32>,
    /// Last message handed out (sequenced framing only).
    completed: Option<u32>,
    parts: BTreeMap<u32, Bytes>,
    /// Index of the last chunk, once seen.
    last_index: Option<u32>,
    buffered: usize,
}

impl Reassembler {
    pub fn new(framing: Framing) -> Self {
        Self::with_max_message_size(framing, MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(framing: Framing, max_message_size: usize) -> Self {
        Self {
            framing,
            max_message_size,
            partial: BytesMut::new(),
            message_id: None,
            completed: None,
            parts: BTreeMap::new(),
            last_index: None,
            buffered: 0,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Returns true when no partial message is buffered.
    pub fn is_idle(&self) -> bool {
        self.partial.is_empty() && self.parts.is_empty() && self.last_index.is_none()
    }

    /// Number of payload bytes held for the current partial message.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// Number of chunks held for the current partial message under
    /// sequenced framing.
    pub fn buffered_chunks(&self) -> usize {
        self.parts.len()
    }

    /// Discards any partial message.
    pub fn reset(&mut self) {
        self.partial.clear();
        self.message_id = None;
        self.parts.clear();
        self.last_index = None;
        self.buffered = 0;
    }

    /// Feeds one chunk.
    ///
    /// Returns `Ok(Some(message))` when the chunk completes a message and
    /// `Ok(None)` while more chunks are needed.
    pub fn push(&mut self, chunk: Chunk) -> Result<Option<Bytes>, ProtocolError> {
        if chunk.payload.is_empty() && !chunk.is_last {
            self.reset();
            return Err(ProtocolError::EmptyChunk { index: chunk.index });
        }
        match self.framing {
            Framing::Marker => self.push_in_arrival_order(chunk),
            Framing::Sequenced => self.push_sequenced(chunk),
        }
    }

    fn push_in_arrival_order(&mut self, chunk: Chunk) -> Result<Option<Bytes>, ProtocolError> {
        self.reserve(chunk.payload.len())?;
        self.partial.extend_from_slice(&chunk.payload);

        if chunk.is_last {
            let message = self.partial.split().freeze();
            self.reset();
            return Ok(Some(message));
        }
        Ok(None)
    }

    fn push_sequenced(&mut self, chunk: Chunk) -> Result<Option<Bytes>, ProtocolError> {
        if self.completed == Some(chunk.message_id) {
            tracing::trace!(
                "Ignoring chunk {} of already delivered message {}",
                chunk.index,
                chunk.message_id
            );
            return Ok(None);
        }

        match self.message_id {
            Some(current) if current != chunk.message_id => {
                tracing::debug!(
                    "Discarding incomplete message {} ({} chunks) for message {}",
                    current,
                    self.parts.len(),
                    chunk.message_id
                );
                self.reset();
                self.message_id = Some(chunk.message_id);
            }
            Some(_) => {}
            None => self.message_id = Some(chunk.message_id),
        }

        if let Some(last) = self.last_index {
            if chunk.index > last {
                return Err(ProtocolError::IndexOutOfRange {
                    index: chunk.index,
                    last,
                });
            }
        }

        if self.parts.contains_key(&chunk.index) {
            tracing::trace!(
                "Ignoring duplicate chunk {} of message {}",
                chunk.index,
                chunk.message_id
            );
            return Ok(None);
        }

        if chunk.is_last {
            if let Some(&highest) = self.parts.keys().next_back() {
                if highest > chunk.index {
                    let err = ProtocolError::IndexOutOfRange {
                        index: highest,
                        last: chunk.index,
                    };
                    self.reset();
                    return Err(err);
                }
            }
            self.last_index = Some(chunk.index);
        }

        self.reserve(chunk.payload.len())?;
        self.parts.insert(chunk.index, chunk.payload);

        match self.last_index {
            Some(last) if self.parts.len() as u64 == u64::from(last) + 1 => {
                let mut message = BytesMut::with_capacity(self.buffered);
                for part in std::mem::take(&mut self.parts).into_values() {
                    message.extend_from_slice(&part);
                }
                self.completed = Some(chunk.message_id);
                self.reset();
                Ok(Some(message.freeze()))
            }
            _ => Ok(None),
        }
    }

    /// Accounts for `len` more payload bytes, dropping the partial message
    /// when the limit would be exceeded.
    fn reserve(&mut self, len: usize) -> Result<(), ProtocolError> {
        let size = self.buffered + len;
        if size > self.max_message_size {
            self.reset();
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }
        self.buffered = size;
        Ok(())
    }
}
