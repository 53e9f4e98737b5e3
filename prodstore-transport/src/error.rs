//! Transport error types.

use std::time::Duration;
use thiserror::Error;

/// Errors from the chunked datagram transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no complete message within {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] prodstore_protocol::ProtocolError),

    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Returns whether this error is a receive timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }

    /// Returns whether a later attempt on a fresh socket may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Io(_))
    }
}
