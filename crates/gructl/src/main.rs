//! gructl - command line tool for managing gru minions.
//!
//! The main entry point for the `gructl` binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gructl::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.config();

    // Create runtime and execute
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Serve(args) => gructl::commands::serve::execute(args, &config).await,
            Commands::List(args) => gructl::commands::list::execute(args, &config).await,
            Commands::Lastseen(args) => gructl::commands::lastseen::execute(args, &config).await,
            Commands::Push(args) => gructl::commands::push::execute(args, &config).await,
        }
    })
}
