//! HTTP JSON-RPC server
//!
//! Accept loop over hyper's HTTP/1 connection builder; every request is
//! routed through an [`RpcHttpHandler`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use omnirpc_json_rpc_server::Dispatcher;

use crate::{HttpRpcError, Result, RpcHttpHandler};

/// Configuration for the HTTP JSON-RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path of the JSON-RPC endpoint; GET calls use `<rpc_path>/<method>`
    pub rpc_path: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Allow GET calls to procedures registered as safe
    pub enable_get: bool,
    /// Resolve a principal from `Authorization: Basic` headers
    pub basic_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rpc_path: "/json".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            enable_get: true,
            basic_auth: false,
        }
    }
}

/// Builder for the HTTP JSON-RPC server
pub struct HttpRpcServerBuilder {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpRpcServerBuilder {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            config: ServerConfig::default(),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the JSON-RPC endpoint path
    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.config.rpc_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Enable or disable GET calls
    pub fn get(mut self, enable: bool) -> Self {
        self.config.enable_get = enable;
        self
    }

    /// Enable or disable HTTP basic authentication
    pub fn basic_auth(mut self, enable: bool) -> Self {
        self.config.basic_auth = enable;
        self
    }

    /// Build the server. The endpoint path must be absolute.
    pub fn build(self) -> Result<HttpRpcServer> {
        if !self.config.rpc_path.starts_with('/') {
            return Err(HttpRpcError::InvalidConfig(format!(
                "rpc path must start with '/': {}",
                self.config.rpc_path
            )));
        }
        Ok(HttpRpcServer {
            handler: RpcHttpHandler::new(self.config, self.dispatcher),
        })
    }
}

/// HTTP JSON-RPC server
#[derive(Clone)]
pub struct HttpRpcServer {
    handler: RpcHttpHandler,
}

impl HttpRpcServer {
    pub fn builder(dispatcher: Dispatcher) -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::new(dispatcher)
    }

    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }

    /// Request handler, usable without a socket
    pub fn handler(&self) -> &RpcHttpHandler {
        &self.handler
    }

    /// Accept connections until the listener fails
    pub async fn run(&self) -> Result<()> {
        let config = self.handler.config();
        let listener = TcpListener::bind(&config.bind_address).await?;
        info!("HTTP JSON-RPC server listening on {}", config.bind_address);
        info!("JSON-RPC endpoint available at: {}", config.rpc_path);
        info!(
            "Registered methods: {}",
            self.handler.dispatcher.registry().method_names().join(", ")
        );

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle_request(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let err_str = err.to_string();
                    if err_str.contains("connection closed before message completed") {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}
