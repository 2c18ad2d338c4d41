use clap::{Parser, Subcommand};
use conduit_core::{ServerDescriptor, TraceRecorder};
use conduit_mcp::{Dispatcher, Registry, SessionConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod output;

#[derive(Parser)]
#[command(name = "conduit", about = "Conduit — MCP client runtime")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "conduit.toml", env = "CONDUIT_CONFIG")]
    config: PathBuf,

    /// Replay the protocol trace after the command
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tool in the merged catalog
    Tools,
    /// Invoke one tool by name
    Call {
        /// Tool name from the merged catalog
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Show each configured server and its session state
    Status,
}

#[derive(Deserialize)]
struct ConduitConfig {
    #[serde(default)]
    client: ClientConfig,
    #[serde(default)]
    servers: Vec<ServerDescriptor>,
}

#[derive(Deserialize)]
struct ClientConfig {
    #[serde(default = "default_handshake_secs")]
    handshake_timeout_secs: u64,
    #[serde(default = "default_request_secs")]
    request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_secs(),
            request_timeout_secs: default_request_secs(),
        }
    }
}

fn default_handshake_secs() -> u64 {
    10
}
fn default_request_secs() -> u64 {
    30
}

impl ClientConfig {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "conduit=debug,info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let config: ConduitConfig = toml::from_str(&config_str)?;
    if config.servers.is_empty() {
        anyhow::bail!(
            "No servers configured in '{}'; add [[servers]] entries",
            cli.config.display()
        );
    }

    let registry = Arc::new(Registry::new(config.client.session_config()));
    registry.load(config.servers).await?;

    let report = registry.start_all().await;
    for (server, error) in &report.failed {
        warn!(server = %server, error = %error, "server unavailable");
    }
    if report.started.is_empty() {
        registry.stop_all().await;
        anyhow::bail!("No server could be started");
    }

    let outcome = run_command(&cli, &registry).await;
    registry.stop_all().await;
    outcome
}

async fn run_command(cli: &Cli, registry: &Arc<Registry>) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Tools => {
            let catalog = registry.tool_catalog().await?;
            output::print_catalog(&catalog);
            Ok(())
        }
        Commands::Call { tool, args } => {
            let arguments: serde_json::Value = serde_json::from_str(args)
                .map_err(|e| anyhow::anyhow!("--args is not valid JSON: {e}"))?;

            let dispatcher = Dispatcher::new(registry.clone());
            let trace = TraceRecorder::new();
            let result = dispatcher.call(&trace, tool, arguments).await;

            output::print_result(&result);
            if cli.verbose {
                output::print_trace(&trace.snapshot().await);
            }

            if result.is_failure() {
                anyhow::bail!("tool call failed");
            }
            Ok(())
        }
        Commands::Status => {
            println!("Configured servers:");
            for (name, state) in registry.statuses().await {
                let transport = registry
                    .session(&name)
                    .await
                    .map(|s| s.descriptor().transport.label())
                    .unwrap_or("?");
                println!("  {name}  [{transport}]  {state}");
            }
            Ok(())
        }
    }
}
