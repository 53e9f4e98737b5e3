//! UDP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::registry::CommandRegistry;
use bytes::Bytes;
use prodstore_protocol::{
    Chunk, Decoder, Encoder, ErrorCode, Fragmenter, Reassembler, Request, Response,
    ResponseError, PING, PONG,
};
use prodstore_transport::{initial_message_id, send_chunks_to, TransportConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;

/// Receive buffer size; anything larger than the packet size is dropped.
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Chunk framing and packet size.
    pub transport: TransportConfig,
    /// Partial messages idle longer than this are dropped.
    pub receive_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            transport: config.transport,
            receive_timeout: config.network.receive_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub datagrams_total: AtomicU64,
    pub datagrams_dropped: AtomicU64,
    pub probes_total: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub partials_expired: AtomicU64,
}

/// Callback run after every dispatched request.
pub type AfterHook = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

/// Reassembly state for one client address.
struct PeerState {
    reassembler: Reassembler,
    last_seen: Instant,
}

/// UDP server for prodstore.
pub struct Server {
    config: ServerConfig,
    registry: Arc<CommandRegistry>,
    after_hook: Option<AfterHook>,
    stats: Arc<ServerStats>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
    next_message_id: AtomicU32,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, registry: Arc<CommandRegistry>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            registry,
            after_hook: None,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
            next_message_id: AtomicU32::new(initial_message_id()),
        }
    }

    /// Sets a callback run after each dispatched request.
    pub fn with_after_hook(
        mut self,
        hook: impl Fn(&Request, &Response) + Send + Sync + 'static,
    ) -> Self {
        self.after_hook = Some(Arc::new(hook));
        self
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let socket = UdpSocket::bind(self.config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.bind_addr,
                source,
            })?;
        self.serve(socket).await
    }

    /// Serves requests on an already bound socket until shutdown.
    pub async fn serve(&self, socket: UdpSocket) -> Result<(), ServerError> {
        let fragmenter = self.config.transport.fragmenter()?;
        let mut shutdown_rx = self.shutdown.subscribe();
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            "Server listening on {} ({} framing, {} byte packets)",
            socket.local_addr()?,
            self.config.transport.framing,
            self.config.transport.packet_size
        );

        let mut peers: HashMap<SocketAddr, PeerState> = HashMap::new();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut sweep =
            tokio::time::interval(self.config.receive_timeout.max(Duration::from_millis(1)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, peer)) => {
                            self.on_datagram(&socket, &fragmenter, &mut peers, peer, &buf[..n])
                                .await;
                        }
                        Err(e) => {
                            tracing::warn!("Receive error: {}", e);
                        }
                    }
                }
                _ = sweep.tick() => {
                    self.expire_partials(&mut peers);
                }
                _ = shutdown_rx.changed() => {}
            }
        }

        tracing::info!("Server shutting down");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn on_datagram(
        &self,
        socket: &UdpSocket,
        fragmenter: &Fragmenter,
        peers: &mut HashMap<SocketAddr, PeerState>,
        peer: SocketAddr,
        datagram: &[u8],
    ) {
        self.stats.datagrams_total.fetch_add(1, Ordering::Relaxed);
        let framing = self.config.transport.framing;

        if datagram.len() > self.config.transport.packet_size {
            tracing::warn!(
                "[{}] Dropping oversized datagram ({} > {} bytes)",
                peer,
                datagram.len(),
                self.config.transport.packet_size
            );
            self.stats.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let chunk = match Chunk::decode(framing, datagram) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("[{}] Dropping malformed datagram: {}", peer, e);
                self.stats.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let state = peers.entry(peer).or_insert_with(|| PeerState {
            reassembler: Reassembler::new(framing),
            last_seen: Instant::now(),
        });
        state.last_seen = Instant::now();

        let message = match state.reassembler.push(chunk) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("[{}] Discarding partial message: {}", peer, e);
                self.stats.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let reply = self.handle_message(peer, &message);
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = send_chunks_to(socket, peer, fragmenter, message_id, &reply).await {
            tracing::warn!("[{}] Failed to send reply: {}", peer, e);
            self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Turns one complete incoming message into the reply payload.
    fn handle_message(&self, peer: SocketAddr, message: &[u8]) -> Bytes {
        if message == PING {
            tracing::trace!("[{}] Liveness probe", peer);
            self.stats.probes_total.fetch_add(1, Ordering::Relaxed);
            return Bytes::from_static(PONG);
        }

        self.stats.requests_total.fetch_add(1, Ordering::Relaxed);
        let response = match Decoder::decode_request(message) {
            Ok(request) => {
                tracing::debug!("[{}] Request '{}'", peer, request.command);
                let response = self.registry.dispatch(&request);
                if let Some(hook) = &self.after_hook {
                    hook(&request, &response);
                }
                response
            }
            Err(e) => {
                tracing::warn!("[{}] Undecodable request: {}", peer, e);
                Response::error(ResponseError::new(ErrorCode::BadRequest, e.to_string()))
            }
        };

        if response.is_error() {
            self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
        }

        match Encoder::encode_response(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("[{}] Failed to encode response: {}", peer, e);
                Bytes::from_static(
                    br#"{"status":"error","error":{"code":"INTERNAL_ERROR","message":"response encoding failed"}}"#,
                )
            }
        }
    }

    /// Forgets peers whose last chunk is older than the receive timeout.
    fn expire_partials(&self, peers: &mut HashMap<SocketAddr, PeerState>) {
        let timeout = self.config.receive_timeout;
        peers.retain(|peer, state| {
            if state.last_seen.elapsed() <= timeout {
                return true;
            }
            if !state.reassembler.is_idle() {
                tracing::debug!(
                    "[{}] Dropping partial message ({} bytes, {} chunks) after {:?}",
                    peer,
                    state.reassembler.buffered_bytes(),
                    state.reassembler.buffered_chunks(),
                    timeout
                );
                self.stats.partials_expired.fetch_add(1, Ordering::Relaxed);
            }
            false
        });
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
