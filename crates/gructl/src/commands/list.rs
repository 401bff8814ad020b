//! `gructl list` - list registered minions.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeSet;

use gru_core::paths::MINION_SPACE;

use crate::{client, Config};

/// Arguments for the list command.
#[derive(Debug, Args)]
pub struct ListArgs {}

/// Lists the minion identifiers registered under the minion keyspace.
///
/// # Errors
///
/// Returns an error when the keyspace cannot be read.
pub async fn execute(_args: ListArgs, config: &Config) -> Result<()> {
    let kv = client::connect(config)?;

    let node = match kv.get(MINION_SPACE, true).await {
        Ok(node) => node,
        Err(e) if e.is_not_found() => {
            println!("No minions registered");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut ids = BTreeSet::new();
    collect_ids(&node.nodes, &mut ids);
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

/// Extracts the distinct minion id segments from keys under the keyspace.
fn collect_ids(nodes: &[gru_core::Node], ids: &mut BTreeSet<String>) {
    let prefix = format!("{MINION_SPACE}/");
    for node in nodes {
        if let Some(rest) = node.key.strip_prefix(&prefix) {
            let id = rest.split('/').next().unwrap_or(rest);
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
        collect_ids(&node.nodes, ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gru_core::Node;

    #[test]
    fn collect_ids_deduplicates_minions() {
        let nodes = vec![
            Node::leaf("/gru/minion/abc/name", "Kevin"),
            Node::leaf("/gru/minion/abc/lastseen", "1"),
            Node::leaf("/gru/minion/def/name", "Bob"),
        ];
        let mut ids = BTreeSet::new();
        collect_ids(&nodes, &mut ids);
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec!["abc".to_string(), "def".to_string()]
        );
    }
}
