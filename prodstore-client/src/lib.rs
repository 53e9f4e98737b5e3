//! # prodstore-client
//!
//! Client library for prodstore.
//!
//! This crate provides:
//! - A connection over the chunked datagram transport with liveness probing
//! - The session state machine and the reconnect loop built on it
//! - High-level API for every collection command

pub mod client;
pub mod connection;
pub mod error;
pub mod probe;
pub mod session;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use probe::probe;
pub use session::{ConnectionState, ConnectionTracker, Reconnector, SessionEvent, SessionExit};
