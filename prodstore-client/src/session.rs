//! Client session state machine and reconnect loop.
//!
//! [`ConnectionTracker`] is the pure state machine: it is fed probe outcomes
//! together with the time they happened and decides when the connection
//! counts as lost. [`Reconnector`] drives it against a real server.

use crate::client::Client;
use crate::connection::{Connection, ConnectionConfig};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Whether the server currently answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Notifications produced by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A probe succeeded; interactive mode starts.
    Connected,
    /// Probes have failed for longer than the loss threshold.
    ConnectionLost { down_for: Duration },
}

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The user asked to leave; the reconnect loop stops.
    Quit,
    /// A request failed at the transport level; the loop probes again.
    Lost,
}

/// Connection health bookkeeping.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    state: ConnectionState,
    last_success_at: Instant,
    loss_announced: bool,
    lost_threshold: Duration,
}

impl ConnectionTracker {
    /// Starts disconnected, with the loss clock running from `now`.
    pub fn new(lost_threshold: Duration, now: Instant) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_success_at: now,
            loss_announced: false,
            lost_threshold,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_success_at(&self) -> Instant {
        self.last_success_at
    }

    pub fn loss_announced(&self) -> bool {
        self.loss_announced
    }

    pub fn on_probe_success(&mut self, now: Instant) -> SessionEvent {
        self.state = ConnectionState::Connected;
        self.last_success_at = now;
        self.loss_announced = false;
        SessionEvent::Connected
    }

    /// Records a failed probe. Returns the loss notification the first time
    /// the failure streak exceeds the threshold in an episode.
    pub fn on_probe_failure(&mut self, now: Instant) -> Option<SessionEvent> {
        self.state = ConnectionState::Disconnected;
        let down_for = now.saturating_duration_since(self.last_success_at);
        if down_for > self.lost_threshold && !self.loss_announced {
            self.loss_announced = true;
            return Some(SessionEvent::ConnectionLost { down_for });
        }
        None
    }

    /// Records the end of an interactive session.
    ///
    /// The server was reachable for the whole session, so the loss clock
    /// restarts at `now`.
    pub fn on_session_end(&mut self, now: Instant) {
        self.state = ConnectionState::Disconnected;
        self.last_success_at = now;
    }
}

/// Drives the probe / interactive / retry loop.
pub struct Reconnector {
    config: ConnectionConfig,
    shutdown: watch::Sender<bool>,
}

impl Reconnector {
    pub fn new(config: ConnectionConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { config, shutdown }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Stops the loop at its next probe or retry pause.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs until `interactive` returns [`SessionExit::Quit`] or shutdown is
    /// requested.
    ///
    /// Every successful probe hands a fresh [`Client`] to `interactive`.
    /// `notify` receives [`SessionEvent::Connected`] on every success and
    /// [`SessionEvent::ConnectionLost`] at most once per loss episode.
    pub async fn run<F, Fut, N>(&self, mut interactive: F, mut notify: N)
    where
        F: FnMut(Client) -> Fut,
        Fut: Future<Output = SessionExit>,
        N: FnMut(SessionEvent),
    {
        let mut tracker = ConnectionTracker::new(self.config.lost_threshold, Instant::now());
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let attempt = tokio::select! {
                attempt = self.attempt() => attempt,
                _ = shutdown_rx.changed() => break,
            };

            match attempt {
                Some(client) => {
                    notify(tracker.on_probe_success(Instant::now()));
                    let exit = tokio::select! {
                        exit = interactive(client) => exit,
                        _ = shutdown_rx.changed() => break,
                    };
                    tracker.on_session_end(Instant::now());
                    match exit {
                        SessionExit::Quit => break,
                        SessionExit::Lost => {
                            tracing::warn!("Session with {} ended, reconnecting", self.config.addr);
                            continue;
                        }
                    }
                }
                None => {
                    if let Some(event) = tracker.on_probe_failure(Instant::now()) {
                        notify(event);
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_interval) => {}
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::debug!("Reconnect loop stopped");
    }

    /// Opens a connection and probes it once.
    async fn attempt(&self) -> Option<Client> {
        let mut conn = match Connection::open(self.config.clone()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Cannot open session to {}: {}", self.config.addr, e);
                return None;
            }
        };

        if conn.probe().await {
            Some(Client::new(conn))
        } else {
            tracing::warn!("No liveness reply from {}", self.config.addr);
            conn.close();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::net::UdpSocket;

    const THRESHOLD: Duration = Duration::from_millis(30000);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_starts_disconnected() {
        let tracker = ConnectionTracker::new(THRESHOLD, Instant::now());
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
        assert!(!tracker.loss_announced());
    }

    #[test]
    fn test_loss_announced_once() {
        let t0 = Instant::now();
        let mut tracker = ConnectionTracker::new(THRESHOLD, t0);

        let mut announcements = 0;
        for s in 1..=90 {
            if let Some(event) = tracker.on_probe_failure(t0 + secs(s)) {
                assert_eq!(event, SessionEvent::ConnectionLost { down_for: secs(s) });
                assert_eq!(s, 31);
                announcements += 1;
            }
        }
        assert_eq!(announcements, 1);
        assert!(tracker.loss_announced());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let t0 = Instant::now();
        let mut tracker = ConnectionTracker::new(THRESHOLD, t0);
        assert_eq!(tracker.on_probe_failure(t0 + THRESHOLD), None);
        assert!(tracker
            .on_probe_failure(t0 + THRESHOLD + Duration::from_millis(1))
            .is_some());
    }

    #[test]
    fn test_success_rearms_announcement() {
        let t0 = Instant::now();
        let mut tracker = ConnectionTracker::new(THRESHOLD, t0);
        assert!(tracker.on_probe_failure(t0 + secs(31)).is_some());

        assert_eq!(
            tracker.on_probe_success(t0 + secs(40)),
            SessionEvent::Connected
        );
        assert_eq!(tracker.state(), ConnectionState::Connected);
        assert!(!tracker.loss_announced());

        tracker.on_session_end(t0 + secs(50));
        assert_eq!(tracker.on_probe_failure(t0 + secs(70)), None);
        assert!(tracker.on_probe_failure(t0 + secs(81)).is_some());
        assert_eq!(tracker.on_probe_failure(t0 + secs(200)), None);
    }

    /// Answers every probe with PONG.
    async fn pong_server() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                if &buf[..n] == b"PING\x01" {
                    let _ = socket.send_to(b"PONG\x01", peer).await;
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_reconnector_quit_ends_loop() {
        let addr = pong_server().await;
        let reconnector = Reconnector::new(ConnectionConfig::new(addr));
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut sessions = 0;

        {
            let events = events.clone();
            reconnector
                .run(
                    |_client| {
                        sessions += 1;
                        let exit = if sessions < 2 {
                            SessionExit::Lost
                        } else {
                            SessionExit::Quit
                        };
                        async move { exit }
                    },
                    move |event| events.lock().unwrap().push(event),
                )
                .await;
        }

        assert_eq!(sessions, 2);
        assert_eq!(
            *events.lock().unwrap(),
            vec![SessionEvent::Connected, SessionEvent::Connected]
        );
    }

    #[tokio::test]
    async fn test_reconnector_announces_loss_and_stops_on_shutdown() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ConnectionConfig::new(silent.local_addr().unwrap())
            .with_connect_timeout(Duration::from_millis(20))
            .with_retry_interval(Duration::from_millis(10))
            .with_lost_threshold(Duration::from_millis(100));
        let reconnector = Arc::new(Reconnector::new(config));
        let events = Arc::new(Mutex::new(Vec::new()));

        let stopper = {
            let reconnector = reconnector.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                reconnector.shutdown();
            })
        };

        {
            let events = events.clone();
            tokio::time::timeout(
                Duration::from_secs(5),
                reconnector.run(
                    |_client| async { SessionExit::Quit },
                    move |event| events.lock().unwrap().push(event),
                ),
            )
            .await
            .unwrap();
        }
        stopper.await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SessionEvent::ConnectionLost { .. }));
        assert!(reconnector.is_shutdown());
    }
    #[tokio::test]
    async fn test_open_failures_count_toward_loss() {
        // A packet size with no room for payload makes every open fail.
        let transport = prodstore_transport::TransportConfig::default()
            .with_framing(prodstore_protocol::Framing::Sequenced)
            .with_packet_size(4);
        let config = ConnectionConfig::new("127.0.0.1:9".parse().unwrap())
            .with_transport(transport)
            .with_retry_interval(Duration::from_millis(10))
            .with_lost_threshold(Duration::from_millis(100));
        assert!(Connection::open(config.clone()).await.is_err());

        let reconnector = Arc::new(Reconnector::new(config));
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut sessions = 0;

        let stopper = {
            let reconnector = reconnector.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(400)).await;
                reconnector.shutdown();
            })
        };

        {
            let events = events.clone();
            tokio::time::timeout(
                Duration::from_secs(5),
                reconnector.run(
                    |_client| {
                        sessions += 1;
                        async { SessionExit::Quit }
                    },
                    move |event| events.lock().unwrap().push(event),
                ),
            )
            .await
            .unwrap();
        }
        stopper.await.unwrap();

        assert_eq!(sessions, 0);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match events[0] {
            SessionEvent::ConnectionLost { down_for } => {
                assert!(down_for > Duration::from_millis(100));
            }
            SessionEvent::Connected => panic!("open never succeeds"),
        }
    }
}
