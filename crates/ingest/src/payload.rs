//! Payload decoding

use serde_json::{Map, Value};
use thiserror::Error;

/// Decoded top-level JSON object of a message
pub type Fields = Map<String, Value>;

/// Errors while decoding a payload
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes are not UTF-8 JSON
    #[error("Could not decode JSON payload: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not an object
    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decode a payload into its top-level object
pub fn decode_object(payload: &[u8]) -> Result<Fields, DecodeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    match value {
        Value::Object(fields) => Ok(fields),
        Value::Null => Err(DecodeError::NotAnObject("null")),
        Value::Bool(_) => Err(DecodeError::NotAnObject("a boolean")),
        Value::Number(_) => Err(DecodeError::NotAnObject("a number")),
        Value::String(_) => Err(DecodeError::NotAnObject("a string")),
        Value::Array(_) => Err(DecodeError::NotAnObject("an array")),
    }
}
