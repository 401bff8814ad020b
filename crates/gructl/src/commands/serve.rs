//! `gructl serve` - run a minion agent.

use anyhow::{Context, Result};
use clap::Args;

use gru_minion::agent::Minion;

use crate::{client, Config};

/// Arguments for the serve command.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Name of the minion.
    pub name: String,
}

/// Runs a minion agent until interrupted.
///
/// # Errors
///
/// Returns an error when the gateway cannot be built or the minion fails
/// to register itself at startup.
pub async fn execute(args: ServeArgs, config: &Config) -> Result<()> {
    gru_catalog::register_builtin();
    gru_minion::classifier::register_builtin();

    let kv = client::connect(config)?;
    let minion = Minion::new(args.name, kv);
    minion
        .serve()
        .await
        .context("Failed to start minion services")?;

    println!("Minion {} is serving (press Ctrl-C to stop)", minion.id());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    minion.stop();
    Ok(())
}
