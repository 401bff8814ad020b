//! `gructl push` - enqueue a task for a minion.

use anyhow::{Context, Result};
use clap::Args;
use ulid::Ulid;

use gru_catalog::Catalog;
use gru_core::id::MinionId;
use gru_core::kv::SetOptions;
use gru_core::paths::MinionPaths;
use gru_minion::task::Task;

use crate::{client, Config};

/// Arguments for the push command.
#[derive(Debug, Args)]
pub struct PushArgs {
    /// Name of the target minion.
    pub name: String,

    /// Path to a JSON catalog file; omit to push an empty catalog.
    #[arg(long)]
    pub catalog: Option<std::path::PathBuf>,

    /// Allow the task to run alongside others on the minion.
    #[arg(long)]
    pub concurrent: bool,
}

/// Enqueues a task on the target minion's queue.
///
/// Queue entry keys are ULIDs, so a backlog drains in submission order.
///
/// # Errors
///
/// Returns an error when the catalog file cannot be read or the queue
/// write fails.
pub async fn execute(args: PushArgs, config: &Config) -> Result<()> {
    let catalog = match &args.catalog {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read catalog {}", path.display()))?;
            serde_json::from_str::<Catalog>(&raw)
                .with_context(|| format!("Invalid catalog {}", path.display()))?
        }
        None => Catalog::new(),
    };

    let mut task = Task::new(catalog);
    task.is_concurrent = args.concurrent;

    let kv = client::connect(config)?;
    let paths = MinionPaths::new(MinionId::derive(&args.name));
    let entry = paths.queue_key(&Ulid::new().to_string());
    kv.set(&entry, &task.to_json()?, SetOptions::none())
        .await
        .context("Failed to enqueue task")?;

    println!("Pushed task {} to minion {}", task.task_id, args.name);
    Ok(())
}
