//! # gructl
//!
//! Command-line tool for managing gru minions.
//!
//! ## Commands
//!
//! - `gructl serve <name>` - Run a minion agent
//! - `gructl list` - List registered minions
//! - `gructl lastseen <name>` - Show when a minion was last seen
//! - `gructl push <name>` - Enqueue a task for a minion
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `GRUCTL_ENDPOINT` - etcd cluster endpoints, comma-separated
//! - `GRUCTL_USERNAME` - Username for authentication
//! - `GRUCTL_PASSWORD` - Password for authentication
//! - `GRUCTL_TIMEOUT` - Connection timeout per request, in seconds

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod client;
pub mod commands;

use clap::{Parser, Subcommand};
use std::time::Duration;

/// gructl - command line tool for managing minions.
#[derive(Debug, Parser)]
#[command(name = "gructl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// etcd cluster endpoints, comma-separated.
    #[arg(
        long,
        env = "GRUCTL_ENDPOINT",
        default_value = "http://127.0.0.1:2379,http://localhost:4001"
    )]
    pub endpoint: String,

    /// Username to use for authentication.
    #[arg(long, env = "GRUCTL_USERNAME", default_value = "")]
    pub username: String,

    /// Password to use for authentication.
    #[arg(long, env = "GRUCTL_PASSWORD", default_value = "")]
    pub password: String,

    /// Connection timeout per request, in seconds.
    #[arg(long, env = "GRUCTL_TIMEOUT", default_value_t = 1)]
    pub timeout: u64,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            endpoints: self
                .endpoint
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a minion agent.
    Serve(commands::serve::ServeArgs),
    /// List registered minions.
    List(commands::list::ListArgs),
    /// Show when a minion was last seen.
    Lastseen(commands::lastseen::LastseenArgs),
    /// Enqueue a task for a minion.
    Push(commands::push::PushArgs),
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// etcd cluster endpoints.
    pub endpoints: Vec<String>,
    /// Username for authentication; empty disables authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Per-request timeout.
    pub timeout: Duration,
}
