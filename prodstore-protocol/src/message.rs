//! JSON message types for requests and responses.

use crate::error::ErrorCode;
use crate::product::{NewProduct, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Command name used for dispatch.
    pub command: String,

    /// Command-specific arguments.
    #[serde(default = "empty_args")]
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: empty_args(),
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Stable error code.
    pub code: ErrorCode,

    /// Human-readable error message.
    pub message: String,
}

impl ResponseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Response message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response status.
    pub status: ResponseStatus,

    /// Result payload (for successful responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details (for error responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(result: Value) -> Self {
        Self {
            status: ResponseStatus::Ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(error: ResponseError) -> Self {
        Self {
            status: ResponseStatus::Error,
            result: None,
            error: Some(error),
        }
    }

    /// Response for a command name with no registered handler.
    pub fn unknown_command(command: &str) -> Self {
        Self::error(ResponseError::new(
            ErrorCode::UnknownCommand,
            format!("unknown command: {command}"),
        ))
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Returns the error code, if this is an error response.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

// ============================================================================
// Command-specific argument and result types
// ============================================================================

/// Arguments for commands addressing a product by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdParams {
    pub id: u64,
}

/// Arguments for UPDATE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParams {
    pub id: u64,
    pub product: NewProduct,
}

/// Arguments for FILTER_BY_PRICE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceParams {
    pub price: f64,
}

/// Arguments for FILTER_CONTAINS_PART_NUMBER.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartNumberParams {
    pub part: String,
}

/// Result for INFO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResult {
    pub collection_type: String,
    pub init_date: DateTime<Utc>,
    pub size: usize,
}

/// Result for commands returning a list of products.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

/// Result for SUM_OF_PRICE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumResult {
    pub sum: f64,
}

/// Result for HELP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelpResult {
    pub commands: Vec<CommandDescription>,
}

/// One entry of the HELP listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescription {
    pub name: String,
    pub description: String,
}
