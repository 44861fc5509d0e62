//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding a request
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message body is not valid JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Message is JSON but not a request object
    #[error("Invalid request: expected a JSON object")]
    NotAnObject,

    /// `method` is missing or not a string
    #[error("Invalid request: missing method name")]
    MissingMethod,

    /// `params` is present but not an array
    #[error("Invalid request: params must be an array")]
    InvalidParams,
}
