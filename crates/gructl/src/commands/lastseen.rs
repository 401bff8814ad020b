//! `gructl lastseen` - show when a minion was last seen.

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Args;

use gru_core::id::MinionId;
use gru_core::paths::MinionPaths;

use crate::{client, Config};

/// Arguments for the lastseen command.
#[derive(Debug, Args)]
pub struct LastseenArgs {
    /// Name of the minion.
    pub name: String,
}

/// Prints the lastseen timestamp recorded by a minion.
///
/// # Errors
///
/// Returns an error when the minion has no lastseen record or the value is
/// not a valid timestamp.
pub async fn execute(args: LastseenArgs, config: &Config) -> Result<()> {
    let kv = client::connect(config)?;
    let paths = MinionPaths::new(MinionId::derive(&args.name));

    let node = kv
        .get(&paths.lastseen_key(), false)
        .await
        .with_context(|| format!("No lastseen record for minion '{}'", args.name))?;
    let secs: i64 = node
        .value
        .parse()
        .with_context(|| format!("Invalid lastseen value '{}'", node.value))?;

    match DateTime::from_timestamp(secs, 0) {
        Some(when) => println!("{secs} ({when})"),
        None => println!("{secs}"),
    }
    Ok(())
}
