//! Server error types.

use prodstore_protocol::{ErrorCode, ResponseError};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] prodstore_protocol::ProtocolError),

    #[error("storage error: {0}")]
    Storage(#[from] prodstore_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("condition not met: {0}")]
    ConditionNotMet(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
}

impl ServerError {
    /// Converts to protocol error code.
    pub fn error_code(&self) -> ErrorCode {
        use prodstore_storage::StorageError;

        match self {
            ServerError::Io(_) => ErrorCode::InternalError,
            ServerError::Protocol(_) => ErrorCode::BadRequest,
            ServerError::Storage(e) => match e {
                StorageError::NotFound(_) => ErrorCode::NotFound,
                StorageError::InvalidProduct(_) => ErrorCode::InvalidProduct,
                _ => ErrorCode::InternalError,
            },
            ServerError::Json(_) => ErrorCode::BadRequest,
            ServerError::InvalidRequest(_) => ErrorCode::BadRequest,
            ServerError::ConditionNotMet(_) => ErrorCode::ConditionNotMet,
            ServerError::Bind { .. } => ErrorCode::InternalError,
        }
    }

    /// Builds the response error carried back to the client.
    pub fn to_response_error(&self) -> ResponseError {
        ResponseError::new(self.error_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodstore_protocol::InvalidProduct;
    use prodstore_storage::StorageError;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ServerError::Storage(StorageError::NotFound(3)).error_code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            ServerError::Storage(StorageError::InvalidProduct(InvalidProduct("x".into())))
                .error_code(),
            ErrorCode::InvalidProduct
        );
        assert_eq!(
            ServerError::InvalidRequest("missing id".into()).error_code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ServerError::ConditionNotMet("not max".into()).error_code(),
            ErrorCode::ConditionNotMet
        );
        assert_eq!(
            ServerError::Bind {
                addr: "127.0.0.1:23586".parse().unwrap(),
                source: std::io::ErrorKind::AddrInUse.into(),
            }
            .error_code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_response_error_message() {
        let err = ServerError::Storage(StorageError::NotFound(7)).to_response_error();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains('7'));
    }
}
