//! # gru-minion
//!
//! The gru minion agent.
//!
//! A minion binds to one store identity (derived from its name), advertises
//! liveness and classification metadata, receives tasks through its queue
//! prefix, executes them against a declarative resource catalog, and records
//! results where the controller can observe them.
//!
//! ## Components
//!
//! - [`task`]: Task records, their state machine, and the wire codec
//! - [`classifier`]: Classification facts and their registry
//! - [`writer`]: Idempotent state writers for the per-minion keyspace
//! - [`agent`]: The serving loops: backlog drainer, queue watcher, task
//!   runner, periodic scheduler, and lifecycle
//! - [`metrics`]: Metric names emitted by the agent loops
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gru_core::kv::{Kv, MemoryKv};
//! use gru_minion::agent::Minion;
//!
//! # async fn example() -> gru_core::Result<()> {
//! gru_minion::classifier::register_builtin();
//! gru_catalog::register_builtin();
//!
//! let kv = Arc::new(MemoryKv::new()) as Arc<dyn Kv>;
//! let minion = Minion::new("Kevin", kv);
//! minion.serve().await?;
//! // ... until shutdown ...
//! minion.stop();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod agent;
pub mod classifier;
pub mod metrics;
pub mod task;
pub mod writer;

pub use agent::{Minion, TICK_INTERVAL};
pub use classifier::Classifier;
pub use task::{Task, TaskState};
pub use writer::{StateWriter, CLASSIFIER_TTL};
