//! # JSON-RPC Dispatch Engine
//!
//! A transport-agnostic server-side dispatcher that speaks JSON-RPC 1.0, 1.1
//! and 2.0 at the same time. Procedures are registered with a typed signature
//! string (`"echo(String) -> String"`); the dispatcher negotiates the protocol
//! generation per call, normalises arguments, optionally checks credentials
//! and argument types, invokes the procedure and shapes the response for the
//! generation the caller spoke.
//!
//! ## Features
//! - Per-call version negotiation (`jsonrpc` / `version` members)
//! - 1.1 mixed positional/named parameters
//! - Batches dispatched concurrently with per-call fault isolation
//! - Signature DSL with type validation and `system.describe` introspection
//! - Pluggable credential checking for authenticated procedures
//!
//! ```rust
//! use omnirpc_json_rpc_server::prelude::*;
//! use serde_json::json;
//!
//! # async fn demo() {
//! let mut registry = Registry::new(RegistryConfig::new("demo"));
//! registry
//!     .add(
//!         "echo(message=String) -> String",
//!         procedure_fn(|_ctx, args| async move { args.required::<String>("message") }),
//!         ProcedureFlags::new().validated(),
//!     )
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::new(registry);
//! let response = dispatcher
//!     .handle_value(
//!         json!({"jsonrpc": "2.0", "method": "echo", "params": ["hi"], "id": 1}),
//!         &RequestContext::new(),
//!     )
//!     .await;
//! assert_eq!(response.to_value().unwrap()["result"], "hi");
//! # }
//! ```

pub mod auth;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod prelude;
pub mod procedure;
pub mod registry;
pub mod request;
pub mod response;
pub mod signature;
pub mod types;
pub mod validate;

// Re-export main types
pub use auth::{CredentialChecker, StaticCredentials};
pub use codec::{JsonCodec, SerdeJsonCodec};
pub use dispatch::{Dispatcher, EncodedResponse, RequestVerb, TransportRequest};
pub use error::{JsonRpcErrorCode, JsonRpcErrorObject, RpcError, SignatureError};
pub use params::CanonicalArgs;
pub use procedure::{
    Arguments, Authentication, CallContext, FunctionProcedure, Principal, Procedure,
    ProcedureFlags, RequestContext, RpcProcedure, procedure_fn,
};
pub use registry::{Registry, RegistryConfig, ServiceDescriptor};
pub use request::RequestEnvelope;
pub use response::{DispatchResponse, ResponseBody, ResponseEnvelope};
pub use signature::ProcedureSignature;
pub use types::{ProtocolVersion, TypeTag};

/// Content type of every response body
pub const CONTENT_TYPE: &str = "application/json-rpc";

/// Error codes carried in the `code` member of an error object
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Application-level faults reuse HTTP-like codes
    pub const INVALID_CREDENTIALS: i64 = 401;
    pub const OTHER_ERROR: i64 = 500;
}
