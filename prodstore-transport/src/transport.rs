//! Chunked transport over a UDP socket.

use crate::config::TransportConfig;
use crate::error::TransportError;
use bytes::Bytes;
use prodstore_protocol::{Chunk, Fragmenter, Reassembler};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Receive buffer size. Larger than any configured packet so oversized
/// datagrams can be detected instead of silently truncated.
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Sends the chunks of `message` to `peer`, one datagram per chunk, in order.
///
/// Returns the number of chunks sent. Sending is fire-and-forget per chunk.
pub async fn send_chunks_to(
    socket: &UdpSocket,
    peer: SocketAddr,
    fragmenter: &Fragmenter,
    message_id: u32,
    message: &[u8],
) -> Result<usize, TransportError> {
    let chunks = fragmenter.fragment(message_id, message);
    let total = chunks.len();
    tracing::debug!(
        "Sending {} bytes to {} in {} chunk(s)",
        message.len(),
        peer,
        total
    );

    for (i, chunk) in chunks.iter().enumerate() {
        socket
            .send_to(&chunk.encode(fragmenter.framing()), peer)
            .await?;
        tracing::trace!("Chunk {}/{} sent to {}", i + 1, total, peer);
    }
    Ok(total)
}

/// Returns a starting message id that differs across process restarts.
pub fn initial_message_id() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or_default()
}

/// A datagram session with a single fixed peer.
///
/// At most one request/response exchange is in flight at a time: `send`
/// and `receive` take `&mut self`.
pub struct ChunkedTransport {
    socket: Option<UdpSocket>,
    peer: SocketAddr,
    config: TransportConfig,
    fragmenter: Fragmenter,
    reassembler: Reassembler,
    next_message_id: u32,
    recv_buf: Vec<u8>,
}

impl ChunkedTransport {
    /// Binds an ephemeral local endpoint and fixes `peer` as the remote.
    pub async fn connect(peer: SocketAddr, config: TransportConfig) -> Result<Self, TransportError> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        Self::from_socket(socket, peer, config).await
    }

    /// Wraps an already bound socket and fixes `peer` as the remote.
    pub async fn from_socket(
        socket: UdpSocket,
        peer: SocketAddr,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let fragmenter = config.fragmenter()?;
        socket.connect(peer).await?;
        tracing::debug!(
            "Datagram session {} -> {} ({} framing, {} byte packets)",
            socket.local_addr()?,
            peer,
            config.framing,
            config.packet_size
        );

        Ok(Self {
            socket: Some(socket),
            peer,
            config,
            fragmenter,
            reassembler: Reassembler::new(config.framing),
            next_message_id: initial_message_id(),
            recv_buf: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket()?.local_addr()?)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }

    /// Fragments `message` and sends every chunk in order.
    ///
    /// Returns the number of chunks sent.
    pub async fn send(&mut self, message: &[u8]) -> Result<usize, TransportError> {
        self.discard_pending()?;

        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);

        let socket = self.socket()?;
        let chunks = self.fragmenter.fragment(message_id, message);
        let total = chunks.len();
        tracing::debug!(
            "Sending {} bytes to {} in {} chunk(s)",
            message.len(),
            self.peer,
            total
        );

        for (i, chunk) in chunks.iter().enumerate() {
            socket.send(&chunk.encode(self.fragmenter.framing())).await?;
            tracing::trace!("Chunk {}/{} sent", i + 1, total);
        }
        Ok(total)
    }

    /// Waits for one complete message from the peer.
    ///
    /// Each attempt waits at most the poll interval for a datagram; the loop
    /// gives up with [`TransportError::Timeout`] once `timeout` has elapsed
    /// since the call began. Malformed datagrams are logged and skipped.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let poll_interval = self.config.poll_interval();
        self.reassembler.reset();

        loop {
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(
                    "Receive from {} timed out after {:?} ({} bytes buffered)",
                    self.peer,
                    now - started,
                    self.reassembler.buffered_bytes()
                );
                self.reassembler.reset();
                return Err(TransportError::Timeout(timeout));
            }

            let wait = poll_interval.min(deadline - now);
            let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
            let n = match tokio::time::timeout(wait, socket.recv(&mut self.recv_buf)).await {
                Ok(result) => result?,
                Err(_) => continue,
            };

            if n > self.config.packet_size {
                tracing::warn!(
                    "Dropping oversized datagram from {} ({} > {} bytes)",
                    self.peer,
                    n,
                    self.config.packet_size
                );
                continue;
            }

            let chunk = match Chunk::decode(self.config.framing, &self.recv_buf[..n]) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!("Dropping malformed datagram from {}: {}", self.peer, e);
                    continue;
                }
            };

            match self.reassembler.push(chunk) {
                Ok(Some(message)) => {
                    tracing::debug!(
                        "Received {} bytes from {} in {:?}",
                        message.len(),
                        self.peer,
                        started.elapsed()
                    );
                    return Ok(message);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Discarding partial message from {}: {}", self.peer, e);
                }
            }
        }
    }

    /// Drops datagrams that arrived outside any exchange, such as late
    /// chunks of a reply that already timed out.
    fn discard_pending(&mut self) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        let mut dropped = 0usize;
        loop {
            match socket.try_recv(&mut self.recv_buf) {
                Ok(_) => dropped += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // A refused earlier send surfaces here; the next exchange reports it.
                Err(_) => break,
            }
        }
        if dropped > 0 {
            tracing::debug!("Discarded {} stale datagram(s) from {}", dropped, self.peer);
        }
        Ok(())
    }

    /// Releases the socket. Safe to call more than once.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            self.reassembler.reset();
            tracing::debug!("Datagram session to {} closed", self.peer);
        }
    }
}

impl Drop for ChunkedTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodstore_protocol::{Framing, MAX_CHUNK_PAYLOAD};

    async fn bind_loopback() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    async fn pair(config: TransportConfig) -> (ChunkedTransport, ChunkedTransport) {
        let a = bind_loopback().await;
        let b = bind_loopback().await;
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        (
            ChunkedTransport::from_socket(a, b_addr, config).await.unwrap(),
            ChunkedTransport::from_socket(b, a_addr, config).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_send_receive_small() {
        let (mut a, mut b) = pair(TransportConfig::default()).await;
        assert_eq!(a.send(b"hello").await.unwrap(), 1);
        let message = b.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(message.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_send_receive_empty() {
        let (mut a, mut b) = pair(TransportConfig::default()).await;
        assert_eq!(a.send(&[]).await.unwrap(), 1);
        let message = b.receive(Duration::from_secs(2)).await.unwrap();
        assert!(message.is_empty());
    }

    #[tokio::test]
    async fn test_send_receive_many_chunks() {
        for framing in [Framing::Marker, Framing::Sequenced] {
            let (mut a, mut b) = pair(TransportConfig::default().with_framing(framing)).await;
            let message: Vec<u8> = (0..MAX_CHUNK_PAYLOAD * 10 + 17)
                .map(|i| (i % 251) as u8)
                .collect();

            let sent = a.send(&message).await.unwrap();
            assert!(sent >= 11);
            let received = b.receive(Duration::from_secs(2)).await.unwrap();
            assert_eq!(received.as_ref(), &message[..]);
        }
    }

    #[tokio::test]
    async fn test_receive_timeout_is_bounded() {
        let (_a, mut b) = pair(TransportConfig::default()).await;
        let timeout = Duration::from_millis(100);

        let started = std::time::Instant::now();
        let result = b.receive(timeout).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(TransportError::Timeout(t)) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_malformed_datagram_skipped() {
        let raw = bind_loopback().await;
        let raw_addr = raw.local_addr().unwrap();
        let config = TransportConfig::default();
        let mut transport = ChunkedTransport::from_socket(bind_loopback().await, raw_addr, config)
            .await
            .unwrap();
        let transport_addr = transport.local_addr().unwrap();

        raw.send_to(b"", transport_addr).await.unwrap();
        raw.send_to(b"bad\x07", transport_addr).await.unwrap();
        raw.send_to(b"PONG\x01", transport_addr).await.unwrap();

        let message = transport.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(message.as_ref(), b"PONG");
    }

    #[tokio::test]
    async fn test_send_chunks_to_reply_path() {
        let server = bind_loopback().await;
        let server_addr = server.local_addr().unwrap();
        let config = TransportConfig::default().with_packet_size(8);
        let mut client = ChunkedTransport::connect(server_addr, config).await.unwrap();

        client.send(b"request").await.unwrap();
        let mut buf = [0u8; 64];
        let (_, client_addr) = server.recv_from(&mut buf).await.unwrap();

        let fragmenter = config.fragmenter().unwrap();
        let sent = send_chunks_to(&server, client_addr, &fragmenter, 0, b"a longer reply")
            .await
            .unwrap();
        assert_eq!(sent, 2);

        let reply = client.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(reply.as_ref(), b"a longer reply");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut a, _b) = pair(TransportConfig::default()).await;
        assert!(a.is_open());
        a.close();
        a.close();
        assert!(!a.is_open());
        assert!(matches!(a.send(b"x").await, Err(TransportError::Closed)));
        assert!(matches!(
            a.receive(Duration::from_millis(10)).await,
            Err(TransportError::Closed)
        ));
    }
}
