//! # prodstore-protocol
//!
//! Wire protocol implementation for prodstore.
//!
//! This crate provides:
//! - Chunk framing with a trailing continuation marker (optionally sequenced)
//! - Fragmentation of messages into datagram-sized chunks and reassembly
//! - JSON Request/Response envelope types and codec
//! - The shared product model, error codes and protocol constants

pub mod chunk;
pub mod codec;
pub mod error;
pub mod message;
pub mod product;
pub mod reassembly;

pub use chunk::{Chunk, Fragmenter, Framing, MAX_CHUNK_PAYLOAD, PACKET_SIZE};
pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use message::{Request, Response, ResponseError, ResponseStatus};
pub use product::{Coordinates, InvalidProduct, NewProduct, Product, UnitOfMeasure};
pub use reassembly::Reassembler;

/// Default port for the prodstore server.
pub const DEFAULT_PORT: u16 = 23586;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Maximum reassembled message size (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Liveness probe request payload.
pub const PING: &[u8] = b"PING";

/// Liveness probe reply payload.
pub const PONG: &[u8] = b"PONG";

/// Command names understood by the server.
pub mod commands {
    pub const HELP: &str = "help";
    pub const INFO: &str = "info";
    pub const SHOW: &str = "show";
    pub const ADD: &str = "add";
    pub const UPDATE: &str = "update";
    pub const REMOVE_BY_ID: &str = "remove_by_id";
    pub const CLEAR: &str = "clear";
    pub const HEAD: &str = "head";
    pub const ADD_IF_MAX: &str = "add_if_max";
    pub const ADD_IF_MIN: &str = "add_if_min";
    pub const SUM_OF_PRICE: &str = "sum_of_price";
    pub const FILTER_BY_PRICE: &str = "filter_by_price";
    pub const FILTER_CONTAINS_PART_NUMBER: &str = "filter_contains_part_number";
}
