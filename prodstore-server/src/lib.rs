//! # prodstore-server
//!
//! UDP server for prodstore.
//!
//! This crate provides:
//! - The command dispatch registry and the collection command handlers
//! - A UDP server loop with per-peer chunk reassembly and liveness replies
//! - Server configuration from YAML and environment variables

pub mod commands;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;

pub use commands::build_registry;
pub use config::{Config, ConfigError};
pub use error::ServerError;
pub use registry::{CommandRegistry, Executable};
pub use server::{AfterHook, Server, ServerConfig, ServerStats};
