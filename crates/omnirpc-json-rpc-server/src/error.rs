use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::error_codes;

/// Fault kinds with a fixed code/status pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InvalidCredentials,
    RequestPost,
    ServerError,
    OtherError,
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InvalidCredentials => error_codes::INVALID_CREDENTIALS,
            JsonRpcErrorCode::RequestPost => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::ServerError => error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::OtherError => error_codes::OTHER_ERROR,
        }
    }

    /// HTTP-like status the transport should answer with
    pub fn status(&self) -> u16 {
        match self {
            JsonRpcErrorCode::ParseError => 400,
            JsonRpcErrorCode::InvalidRequest => 400,
            JsonRpcErrorCode::MethodNotFound => 404,
            JsonRpcErrorCode::InvalidParams => 400,
            JsonRpcErrorCode::InvalidCredentials => 401,
            JsonRpcErrorCode::RequestPost => 405,
            JsonRpcErrorCode::ServerError => 500,
            JsonRpcErrorCode::OtherError => 500,
        }
    }

    /// Wire name of the fault kind
    pub fn name(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "ParseError",
            JsonRpcErrorCode::InvalidRequest => "InvalidRequestError",
            JsonRpcErrorCode::MethodNotFound => "MethodNotFoundError",
            JsonRpcErrorCode::InvalidParams => "InvalidParamsError",
            JsonRpcErrorCode::InvalidCredentials => "InvalidCredentialsError",
            JsonRpcErrorCode::RequestPost => "RequestPostError",
            JsonRpcErrorCode::ServerError => "ServerError",
            JsonRpcErrorCode::OtherError => "OtherError",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "An error occurred while parsing the JSON input.",
            JsonRpcErrorCode::InvalidRequest => "The received JSON is not a valid JSON-RPC Request.",
            JsonRpcErrorCode::MethodNotFound => {
                "The requested remote-procedure does not exist / is not available."
            }
            JsonRpcErrorCode::InvalidParams => "Invalid method parameters.",
            JsonRpcErrorCode::InvalidCredentials => "Invalid login credentials.",
            JsonRpcErrorCode::RequestPost => "JSON-RPC requests must be POST.",
            JsonRpcErrorCode::ServerError => "Internal JSON-RPC error.",
            JsonRpcErrorCode::OtherError => "Error while processing the request",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.name())
    }
}

/// JSON-RPC error object as it appears in the `error` member of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub name: String,
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(kind: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        let detail = message.unwrap_or_else(|| kind.message().to_string());
        Self {
            name: kind.name().to_string(),
            code: kind.code(),
            message: format!("{}: {}", kind.name(), detail),
            data,
        }
    }
}

/// Every fault the dispatcher can shape into an error response.
///
/// Handlers return this type as well; anything that is not a protocol
/// fault should be wrapped with [`RpcError::other`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Request must be POST: {0}")]
    RequestPost(String),

    #[error("Server error: {0}")]
    Server(String),

    /// Unexpected failure inside a handler or the codec.
    /// The detail is logged, never sent to the caller.
    #[error("Unhandled error: {0}")]
    Other(String),
}

impl RpcError {
    pub fn other(err: impl fmt::Display) -> Self {
        RpcError::Other(err.to_string())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        RpcError::InvalidParams(message.into())
    }

    pub fn kind(&self) -> JsonRpcErrorCode {
        match self {
            RpcError::Parse(_) => JsonRpcErrorCode::ParseError,
            RpcError::InvalidRequest(_) => JsonRpcErrorCode::InvalidRequest,
            RpcError::MethodNotFound(_) => JsonRpcErrorCode::MethodNotFound,
            RpcError::InvalidParams(_) => JsonRpcErrorCode::InvalidParams,
            RpcError::InvalidCredentials(_) => JsonRpcErrorCode::InvalidCredentials,
            RpcError::RequestPost(_) => JsonRpcErrorCode::RequestPost,
            RpcError::Server(_) => JsonRpcErrorCode::ServerError,
            RpcError::Other(_) => JsonRpcErrorCode::OtherError,
        }
    }

    pub fn code(&self) -> i64 {
        self.kind().code()
    }

    pub fn status(&self) -> u16 {
        self.kind().status()
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Detail text carried by the fault
    pub fn detail(&self) -> &str {
        match self {
            RpcError::Parse(m)
            | RpcError::InvalidRequest(m)
            | RpcError::MethodNotFound(m)
            | RpcError::InvalidParams(m)
            | RpcError::InvalidCredentials(m)
            | RpcError::RequestPost(m)
            | RpcError::Server(m)
            | RpcError::Other(m) => m,
        }
    }

    /// Convert to the wire error object. `Other` keeps its generic message.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        let kind = self.kind();
        let detail = match self {
            RpcError::Other(_) => None,
            _ if self.detail().is_empty() => None,
            _ => Some(self.detail().to_string()),
        };
        JsonRpcErrorObject::new(kind, detail, None)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Other(err.to_string())
    }
}

/// Rejections raised while parsing a signature string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Invalid method signature `{signature}`")]
    Malformed { signature: String },

    #[error("Unknown type name `{name}` in signature `{signature}`")]
    UnknownType { name: String, signature: String },

    #[error("Could not parse argument `{fragment}` in signature `{signature}`")]
    InvalidArgument { fragment: String, signature: String },

    #[error(
        "Positional argument `{fragment}` must occur before keyword arguments in signature `{signature}`"
    )]
    PositionalAfterKeyword { fragment: String, signature: String },

    #[error("Duplicate argument `{name}` in signature `{signature}`")]
    DuplicateArgument { name: String, signature: String },

    #[error("Signature `{signature}` names no method and the procedure has no name of its own")]
    Unnamed { signature: String },
}
