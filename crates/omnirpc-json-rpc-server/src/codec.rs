//! JSON text codec collaborator

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Could not decode JSON input: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

#[derive(Debug, Error)]
#[error("Could not encode JSON output: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);

/// Converts between wire bytes and decoded values
pub trait JsonCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;

    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError>;
}

/// `serde_json` backed codec
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(value)?)
    }
}
