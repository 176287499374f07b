//! # HTTP JSON-RPC Server
//!
//! HTTP transport for the omnirpc dispatch engine, built on hyper.
//!
//! ## Routes
//! - `POST <rpc_path>`: a JSON-RPC request or batch in the body
//! - `GET <rpc_path>/<method>?arg=value`: call a procedure registered as safe
//! - `OPTIONS`: CORS preflight
//!
//! Any other verb is answered with a `RequestPostError` body.

pub mod cors;
pub mod handler;
pub mod server;

// Re-export main types
pub use cors::CorsLayer;
pub use handler::RpcHttpHandler;
pub use server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

// Re-export foundational types
pub use omnirpc_json_rpc_server::{Dispatcher, Registry, RegistryConfig};

/// Result type for HTTP transport operations
pub type Result<T> = std::result::Result<T, HttpRpcError>;

/// HTTP transport errors
#[derive(Debug, thiserror::Error)]
pub enum HttpRpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
