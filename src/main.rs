//! tabular-gateway CLI: `serve` binds the HTTP surface; `check-config`
//! validates configuration without binding, for container readiness probes.
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use tabular_gateway::config::{ConfigArgs, GatewayConfig};
use tabular_gateway::downstream::client::DownstreamClient;
use tabular_gateway::downstream::profile_store::{PostgrestProfileStore, ProfileStore};
use tabular_gateway::downstream::resource_directory::{PostgrestResourceDirectory, ResourceDirectory};
use tabular_gateway::http_server::{serve, AppState};
use tabular_gateway::observability::init_logging_with_level;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Query-translation gateway over a REST-over-PostgreSQL table service")]
struct Cli {
    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bind 0.0.0.0:PORT and serve the HTTP surface.
    Serve,
    /// Validate configuration (endpoint URLs parse, numeric bounds sane) and
    /// exit without binding.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging_with_level(cli.verbose, cli.quiet)?;

    let config = GatewayConfig::from_args(cli.config)?;

    match cli.command {
        Command::CheckConfig => {
            info!("configuration is valid");
            println!("configuration is valid: downstream={}", config.downstream_base);
            Ok(())
        }
        Command::Serve => {
            let client = Arc::new(DownstreamClient::new(
                config.downstream_base.clone(),
                Duration::from_millis(config.downstream_timeout_ms),
            )?);
            let directory: Arc<dyn ResourceDirectory> = Arc::new(PostgrestResourceDirectory::new(
                client.clone(),
                config.allow_aggregation.clone(),
            ));
            let profiles: Arc<dyn ProfileStore> = Arc::new(PostgrestProfileStore::new(client.clone()));

            let state = AppState {
                client,
                directory,
                profiles,
                config: Arc::new(config),
            };

            serve(state).await
        }
    }
}
