//! Temperature conversion server over streamable HTTP.

use clap::Parser;
use conduit_servers::temperature_service;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "temperature-server", about = "MCP temperature conversion server")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8001, env = "TEMPERATURE_SERVER_PORT")]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Speak line-delimited JSON-RPC on stdin/stdout instead of HTTP.
    #[arg(long)]
    stdio: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    if args.stdio {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
        return conduit_servers::stdio::run(temperature_service()).await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!(addr = %listener.local_addr()?, "temperature server listening");

    conduit_servers::http::serve(Arc::new(temperature_service()), listener).await
}
