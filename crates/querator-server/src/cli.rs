//! Command-line interface of the `querator` binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ConfigOverrides, LayeredConfig};
use crate::daemon::{DaemonFactory, UnimplementedBackend};
use crate::error::LifecycleError;
use crate::lifecycle::{os_signals, Lifecycle};

/// Querator - a queue service with leases, retries and scheduled delivery
#[derive(Debug, Parser)]
#[command(name = "querator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Querator queue service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the Querator server until interrupted
    Server(ServerArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// YAML configuration file
    #[arg(short, long, env = "QUERATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind, host:port
    #[arg(short, long)]
    pub address: Option<String>,

    /// Logging level (debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

impl ServerArgs {
    /// Resolver for these arguments over the process environment.
    pub fn resolver(&self) -> LayeredConfig {
        let mut resolver = LayeredConfig::new().with_overrides(ConfigOverrides {
            address: self.address.clone(),
            log_level: self.log_level.clone(),
        });

        if let Some(path) = self.config.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            resolver = resolver.with_file(path);
        }

        resolver
    }
}

/// Execute a parsed command line.
pub async fn run_cli(cli: Cli) -> Result<(), LifecycleError> {
    match cli.command {
        Commands::Server(args) => run_server(args).await,
    }
}

async fn run_server(args: ServerArgs) -> Result<(), LifecycleError> {
    let signals = os_signals().map_err(LifecycleError::SignalHandler)?;
    let factory = DaemonFactory::new(Arc::new(UnimplementedBackend)).with_logging();

    let trigger = Lifecycle::new(args.resolver(), factory)
        .run(CancellationToken::new(), signals)
        .await?;

    info!(trigger = ?trigger, "Querator stopped");
    Ok(())
}
