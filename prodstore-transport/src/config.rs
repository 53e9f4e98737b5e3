//! Transport configuration.

use prodstore_protocol::{Fragmenter, Framing, ProtocolError, PACKET_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default idle pause between receive attempts.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Chunked transport configuration shared by client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum datagram size, marker byte included.
    pub packet_size: usize,
    /// Chunk layout on the wire.
    pub framing: Framing,
    /// Idle pause between receive attempts in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            packet_size: PACKET_SIZE,
            framing: Framing::Marker,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Returns the poll interval as Duration (at least 1 ms).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Builds the fragmenter for this configuration.
    pub fn fragmenter(&self) -> Result<Fragmenter, ProtocolError> {
        Fragmenter::new(self.framing, self.packet_size)
    }

    /// Checks that the packet size leaves room for payload.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.framing.max_payload(self.packet_size).map(|_| ())
    }
}
