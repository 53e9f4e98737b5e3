//! Protocol error types and error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during chunk framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty datagram: missing continuation marker")]
    MissingMarker,

    #[error("invalid continuation marker: {0:#04x}")]
    InvalidMarker(u8),

    #[error("truncated chunk: {len} bytes (need at least {min})")]
    TruncatedChunk { len: usize, min: usize },

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("packet size {size} leaves no room for payload (minimum {min})")]
    PacketTooSmall { size: usize, min: usize },

    #[error("chunk index {index} beyond last index {last}")]
    IndexOutOfRange { index: u32, last: u32 },

    #[error("empty chunk {index} before the end of the message")]
    EmptyChunk { index: u32 },

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,
}

/// Stable error codes returned in error responses.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Dispatch errors
    UnknownCommand,
    BadRequest,

    // Collection errors
    NotFound,
    InvalidProduct,
    ConditionNotMet,

    // System errors
    InternalError,
}

impl ErrorCode {
    /// Returns whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::InternalError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::UnknownCommand => write!(f, "UNKNOWN_COMMAND"),
            ErrorCode::BadRequest => write!(f, "BAD_REQUEST"),
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::InvalidProduct => write!(f, "INVALID_PRODUCT"),
            ErrorCode::ConditionNotMet => write!(f, "CONDITION_NOT_MET"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_retryable() {
        assert!(ErrorCode::InternalError.is_retryable());

        assert!(!ErrorCode::UnknownCommand.is_retryable());
        assert!(!ErrorCode::BadRequest.is_retryable());
        assert!(!ErrorCode::NotFound.is_retryable());
        assert!(!ErrorCode::InvalidProduct.is_retryable());
        assert!(!ErrorCode::ConditionNotMet.is_retryable());
    }

    #[test]
    fn test_error_code_display_matches_wire() {
        for code in [
            ErrorCode::UnknownCommand,
            ErrorCode::BadRequest,
            ErrorCode::NotFound,
            ErrorCode::InvalidProduct,
            ErrorCode::ConditionNotMet,
            ErrorCode::InternalError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code));
        }
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidMarker(0x07);
        assert!(err.to_string().contains("0x07"));

        let err = ProtocolError::TruncatedChunk { len: 3, min: 13 };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains("13"));

        let err = ProtocolError::CrcMismatch {
            expected: 0xABC,
            actual: 0xDEF,
        };
        let msg = err.to_string();
        assert!(msg.contains("abc") || msg.contains("ABC"));

        let err = ProtocolError::InvalidUtf8;
        assert!(err.to_string().contains("UTF-8"));
    }
}
