//! # Echo Server Example
//!
//! Serves the echo service over HTTP.
//!
//! ```text
//! curl -d '{"jsonrpc": "2.0", "method": "echo", "params": ["hi"], "id": 1}' http://127.0.0.1:8000/json
//! curl 'http://127.0.0.1:8000/json/echo?message=hi'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use omnirpc_echo_server::{DEMO_USERNAME, demo_credentials, echo_registry};
use omnirpc_http_server::HttpRpcServer;
use omnirpc_json_rpc_server::{Dispatcher, ProtocolVersion, RegistryConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "echo-server")]
#[command(about = "JSON-RPC 1.0/1.1/2.0 echo service")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Endpoint path
    #[arg(long, default_value = "/json")]
    path: String,

    /// Service name published by system.describe
    #[arg(long, default_value = "echo-server")]
    name: String,

    /// Protocol assumed when a request names none (1.0, 1.1 or 2.0)
    #[arg(long, default_value = "1.0")]
    default_protocol: ProtocolVersion,

    /// Accept HTTP basic authentication
    #[arg(long)]
    basic_auth: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = RegistryConfig::new(args.name)
        .version(env!("CARGO_PKG_VERSION"))
        .summary("Echo procedures for every JSON-RPC generation")
        .default_protocol(args.default_protocol);
    let registry = echo_registry(config)?;
    let dispatcher = Dispatcher::new(registry).with_credential_checker(Arc::new(demo_credentials()));

    let server = HttpRpcServer::builder(dispatcher)
        .bind_address(args.bind)
        .rpc_path(args.path)
        .basic_auth(args.basic_auth)
        .build()?;

    info!("Starting echo server on http://{}{}", args.bind, server.config().rpc_path);
    info!("Authenticated procedures accept user '{}'", DEMO_USERNAME);

    server.run().await?;
    Ok(())
}
