//! Workspace terminal server over stdio.
//!
//! Protocol frames own stdout; logs go to stderr so the client can drain
//! them without confusing the framing.

use clap::Parser;
use conduit_servers::terminal_service;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "terminal-server", about = "MCP workspace terminal server")]
struct Args {
    /// Directory the tools are confined to. Defaults to the current
    /// directory.
    #[arg(long, env = "WORKSPACE_DIR")]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let workspace = match args.workspace {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    info!(workspace = %workspace.display(), "terminal server starting");

    conduit_servers::stdio::run(terminal_service(workspace)).await
}
