use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{JsonRpcErrorObject, RpcError};
use crate::types::ProtocolVersion;

pub const STATUS_OK: u16 = 200;
/// Answered for notifications; there is no body
pub const STATUS_NO_CONTENT: u16 = 204;

/// Outcome carried by a response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Result(Value),
    Error(JsonRpcErrorObject),
}

/// A response shaped for one protocol generation.
///
/// - 1.0: `{id, result, error}` with the unused member null
/// - 1.1: `{id, version: "1.1", result | error}`
/// - 2.0: `{id, jsonrpc: "2.0", result | error}`
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub version: ProtocolVersion,
    pub id: Value,
    pub outcome: ResponseOutcome,
}

impl ResponseEnvelope {
    pub fn success(version: ProtocolVersion, id: Value, result: Value) -> Self {
        Self {
            version,
            id,
            outcome: ResponseOutcome::Result(result),
        }
    }

    pub fn error(version: ProtocolVersion, id: Value, error: &RpcError) -> Self {
        Self {
            version,
            id,
            outcome: ResponseOutcome::Error(error.to_error_object()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Error(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Result(value) => Some(value),
            ResponseOutcome::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match &self.outcome {
            ResponseOutcome::Error(error) => Some(error),
            ResponseOutcome::Result(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        // Every member is already a JSON value
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        match self.version {
            ProtocolVersion::V1_0 => {
                match &self.outcome {
                    ResponseOutcome::Result(result) => {
                        map.serialize_entry("result", result)?;
                        map.serialize_entry("error", &Value::Null)?;
                    }
                    ResponseOutcome::Error(error) => {
                        map.serialize_entry("result", &Value::Null)?;
                        map.serialize_entry("error", error)?;
                    }
                }
                return map.end();
            }
            ProtocolVersion::V1_1 => map.serialize_entry("version", self.version.as_str())?,
            ProtocolVersion::V2_0 => map.serialize_entry("jsonrpc", self.version.as_str())?,
        }
        match &self.outcome {
            ResponseOutcome::Result(result) => map.serialize_entry("result", result)?,
            ResponseOutcome::Error(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

/// Body of a dispatched request
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Single(ResponseEnvelope),
    Batch(Vec<ResponseEnvelope>),
    /// Notification; nothing is sent back
    NoContent,
}

/// What the dispatcher hands back to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub body: ResponseBody,
    pub status: u16,
}

impl DispatchResponse {
    pub fn single(envelope: ResponseEnvelope, status: u16) -> Self {
        Self {
            body: ResponseBody::Single(envelope),
            status,
        }
    }

    pub fn batch(envelopes: Vec<ResponseEnvelope>) -> Self {
        Self {
            body: ResponseBody::Batch(envelopes),
            status: STATUS_OK,
        }
    }

    pub fn no_content() -> Self {
        Self {
            body: ResponseBody::NoContent,
            status: STATUS_NO_CONTENT,
        }
    }

    /// Response body as a JSON value, if there is one to send
    pub fn to_value(&self) -> Option<Value> {
        match &self.body {
            ResponseBody::Single(envelope) => Some(envelope.to_value()),
            ResponseBody::Batch(envelopes) => Some(Value::Array(
                envelopes.iter().map(ResponseEnvelope::to_value).collect(),
            )),
            ResponseBody::NoContent => None,
        }
    }

    pub fn needs_response(&self) -> bool {
        !matches!(self.body, ResponseBody::NoContent)
    }

    pub fn is_error(&self) -> bool {
        matches!(&self.body, ResponseBody::Single(envelope) if envelope.is_error())
    }
}
