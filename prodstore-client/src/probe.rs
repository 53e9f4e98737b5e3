//! Liveness probe.

use prodstore_protocol::{PING, PONG};
use prodstore_transport::ChunkedTransport;
use std::time::Duration;

/// Sends `PING` and waits up to `timeout` for a reply.
///
/// Returns true only when the reassembled reply is exactly `PONG`. Any
/// timeout, I/O failure or other payload is false. There is no internal
/// retry.
pub async fn probe(transport: &mut ChunkedTransport, timeout: Duration) -> bool {
    if let Err(e) = transport.send(PING).await {
        tracing::debug!("Probe to {} not sent: {}", transport.peer_addr(), e);
        return false;
    }

    match transport.receive(timeout).await {
        Ok(reply) if reply.as_ref() == PONG => true,
        Ok(reply) => {
            tracing::debug!(
                "Probe to {} got unexpected reply ({} bytes)",
                transport.peer_addr(),
                reply.len()
            );
            false
        }
        Err(e) => {
            tracing::debug!("Probe to {} failed: {}", transport.peer_addr(), e);
            false
        }
    }
}
