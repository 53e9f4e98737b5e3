//! Storage error types.

use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("product not found: {0}")]
    NotFound(u64),

    #[error("invalid collection: {0}")]
    Invalid(String),

    #[error(transparent)]
    InvalidProduct(#[from] prodstore_protocol::InvalidProduct),
}
