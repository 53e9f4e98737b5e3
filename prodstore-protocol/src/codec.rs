//! Encoder and decoder between messages and opaque byte payloads.
//!
//! The chunked transport only moves bytes; this codec is the single place
//! where requests and responses are turned into bytes and back.

use crate::error::ProtocolError;
use crate::message::{Request, Response};
use bytes::Bytes;

/// Encodes requests and responses into message payloads.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a message payload.
    pub fn encode_request(request: &Request) -> Result<Bytes, ProtocolError> {
        Self::encode_json(request)
    }

    /// Encodes a response into a message payload.
    pub fn encode_response(response: &Response) -> Result<Bytes, ProtocolError> {
        Self::encode_json(response)
    }

    /// Encodes any JSON-serializable value into a message payload.
    pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }
}

/// Decodes message payloads into requests and responses.
pub struct Decoder;

impl Decoder {
    /// Decodes a request from a reassembled message.
    pub fn decode_request(payload: &[u8]) -> Result<Request, ProtocolError> {
        Self::decode_json(payload)
    }

    /// Decodes a response from a reassembled message.
    pub fn decode_response(payload: &[u8]) -> Result<Response, ProtocolError> {
        Self::decode_json(payload)
    }

    /// Decodes any JSON value from a reassembled message.
    pub fn decode_json<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
        let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use crate::message::{ResponseError, ResponseStatus};
    use crate::ErrorCode;

    #[test]
    fn test_request_roundtrip() {
        let request =
            Request::new(commands::FILTER_BY_PRICE).with_args(serde_json::json!({"price": 3.5}));
        let encoded = Encoder::encode_request(&request).unwrap();
        let decoded = Decoder::decode_request(&encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_error_response_roundtrip() {
        let response = Response::error(ResponseError::new(ErrorCode::NotFound, "no product #4"));
        let encoded = Encoder::encode_response(&response).unwrap();
        let decoded = Decoder::decode_response(&encoded).unwrap();

        assert_eq!(decoded.status, ResponseStatus::Error);
        assert_eq!(decoded.error_code(), Some(ErrorCode::NotFound));
        assert_eq!(decoded.error.unwrap().message, "no product #4");
    }

    #[test]
    fn test_invalid_utf8() {
        let result = Decoder::decode_request(&[0xFF, 0xFE, 0x00]);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_liveness_token_is_not_a_request() {
        let result = Decoder::decode_request(crate::PING);
        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }
}
