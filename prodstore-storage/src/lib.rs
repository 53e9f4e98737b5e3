//! # prodstore-storage
//!
//! Storage layer for prodstore.
//!
//! This crate provides:
//! - JSON dump file loading and atomic saving
//! - The in-memory product repository and its collection operations

pub mod dump;
pub mod error;
pub mod repository;

pub use dump::DumpManager;
pub use error::StorageError;
pub use repository::ProductRepository;
