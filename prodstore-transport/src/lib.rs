//! # prodstore-transport
//!
//! Chunked datagram transport for prodstore.
//!
//! This crate provides:
//! - A UDP session with a fixed peer that sends messages as ordered chunks
//! - Bounded receive that reassembles one message or times out
//! - The chunked reply path used by the server for unconnected sockets

pub mod config;
pub mod error;
pub mod transport;

pub use config::TransportConfig;
pub use error::TransportError;
pub use transport::{initial_message_id, send_chunks_to, ChunkedTransport};
