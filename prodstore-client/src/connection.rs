//! Connection management.

use crate::error::ClientError;
use crate::probe;
use prodstore_protocol::{Decoder, Encoder, Request, Response, DEFAULT_PORT};
use prodstore_transport::{ChunkedTransport, TransportConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Bound on a liveness probe round trip.
    pub connect_timeout: Duration,
    /// Bound on a request round trip.
    pub request_timeout: Duration,
    /// Pause between failed connection attempts.
    pub retry_interval: Duration,
    /// Continuous failure after which the loss is announced.
    pub lost_threshold: Duration,
    /// Chunk framing and packet size.
    pub transport: TransportConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)))
    }
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(5000),
            retry_interval: Duration::from_millis(1000),
            lost_threshold: Duration::from_millis(30000),
            transport: TransportConfig::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_lost_threshold(mut self, threshold: Duration) -> Self {
        self.lost_threshold = threshold;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

/// A datagram session with the server.
///
/// One request is in flight at a time; every exchange is bounded by a
/// timeout from the configuration.
pub struct Connection {
    config: ConnectionConfig,
    transport: ChunkedTransport,
}

impl Connection {
    /// Binds a local socket and fixes the server as peer.
    ///
    /// No datagram is exchanged; use [`probe`](Self::probe) to check that
    /// the server answers.
    pub async fn open(config: ConnectionConfig) -> Result<Self, ClientError> {
        let transport = ChunkedTransport::connect(config.addr, config.transport).await?;
        tracing::debug!("Opened session to {}", config.addr);
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Sends one liveness probe and waits for the reply within the connect
    /// timeout.
    pub async fn probe(&mut self) -> bool {
        probe::probe(&mut self.transport, self.config.connect_timeout).await
    }

    /// Sends a request and waits for its response within the request timeout.
    pub async fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        let payload = Encoder::encode_request(request)?;
        self.transport.send(&payload).await?;

        let reply = self.transport.receive(self.config.request_timeout).await?;
        let response = Decoder::decode_response(&reply)?;
        tracing::debug!(
            "'{}' -> {:?} ({} bytes)",
            request.command,
            response.status,
            reply.len()
        );
        Ok(response)
    }

    /// Closes the session. Safe to call more than once.
    pub fn close(&mut self) {
        self.transport.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodstore_protocol::{Framing, ResponseStatus};
    use prodstore_transport::TransportError;
    use serde_json::json;
    use tokio::net::UdpSocket;

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.addr.port(), 23586);
        assert_eq!(config.addr.ip().to_string(), "127.0.0.1");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_interval, Duration::from_secs(1));
        assert_eq!(config.lost_threshold, Duration::from_secs(30));
        assert_eq!(config.transport.framing, Framing::Marker);
    }

    #[tokio::test]
    async fn test_request_against_fake_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let fake = tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(buf[n - 1], 1);
            let request = Decoder::decode_request(&buf[..n - 1]).unwrap();
            assert_eq!(request.command, "sum_of_price");

            let mut reply = br#"{"status":"ok","result":{"sum":2.5}}"#.to_vec();
            reply.push(1);
            server.send_to(&reply, peer).await.unwrap();
        });

        let mut conn = Connection::open(ConnectionConfig::new(addr)).await.unwrap();
        let response = conn.request(&Request::new("sum_of_price")).await.unwrap();
        assert_eq!(response.status, ResponseStatus::Ok);
        assert_eq!(response.result, Some(json!({"sum": 2.5})));
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ConnectionConfig::new(silent.local_addr().unwrap())
            .with_request_timeout(Duration::from_millis(50));
        let mut conn = Connection::open(config).await.unwrap();

        let err = conn.request(&Request::new("show")).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::Timeout(_))
        ));
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut conn = Connection::open(ConnectionConfig::default()).await.unwrap();
        assert!(conn.is_open());
        conn.close();
        conn.close();
        assert!(!conn.is_open());
    }
}
