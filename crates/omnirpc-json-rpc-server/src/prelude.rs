//! # Dispatch Engine Prelude
//!
//! Convenient re-exports of the types needed to register procedures and
//! dispatch requests.
//!
//! ```rust
//! use omnirpc_json_rpc_server::prelude::*;
//! ```

// Registration
pub use crate::procedure::{
    Arguments, Authentication, CallContext, Principal, ProcedureFlags, RequestContext,
    RpcProcedure, procedure_fn,
};
pub use crate::registry::{Registry, RegistryConfig};
pub use crate::auth::{CredentialChecker, StaticCredentials};

// Dispatch
pub use crate::dispatch::{Dispatcher, RequestVerb, TransportRequest};
pub use crate::response::{DispatchResponse, ResponseEnvelope};
pub use crate::types::{ProtocolVersion, TypeTag};
pub use crate::error::{JsonRpcErrorCode, RpcError};

// Standard error codes
pub use crate::error_codes::*;
