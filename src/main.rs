use anyhow::Result;
use repochat::communication::rpc::RpcServer;
use repochat::gateway::{Gateway, VERSION};
use repochat::Config;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main function to initialize and run the repochat server
fn main() -> Result<()> {
    init_logging();

    let config = Config::load()?;
    let gateway = Arc::new(Gateway::new(config)?);

    // Set up RPC server and register all repository methods
    let mut rpc_server = RpcServer::new();
    gateway.register(&mut rpc_server);

    info!(version = VERSION, "repochat server started");
    rpc_server.run()?;
    info!("stdin closed, shutting down");

    Ok(())
}

/// Logs go to stderr; stdout carries the JSON-RPC responses
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repochat=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
