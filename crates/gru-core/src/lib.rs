//! # gru-core
//!
//! Core abstractions for the gru configuration management fleet.
//!
//! This crate provides the foundational types and traits shared by the minion
//! agent and the controller tooling:
//!
//! - **Identity**: Deterministic minion identifiers derived from names
//! - **Namespace**: Typed key layout under the `/gru/minion` keyspace
//! - **KV Gateway**: Abstract key-value store interface with watch semantics
//! - **Backoff**: Jittered exponential backoff for watch reconnection
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `gru-core` is the only crate allowed to define shared primitives. The
//! minion agent and the controller agree on identifiers and key layout
//! without consulting the store, because both depend on this crate alone.
//!
//! ## Example
//!
//! ```rust
//! use gru_core::id::MinionId;
//! use gru_core::paths::MinionPaths;
//!
//! let id = MinionId::derive("Kevin");
//! let paths = MinionPaths::new(id);
//! assert!(paths.lastseen_key().starts_with("/gru/minion/"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod backoff;
pub mod error;
pub mod id;
pub mod kv;
pub mod paths;

pub use backoff::Backoff;
pub use error::{Error, Result};
pub use id::MinionId;
pub use kv::{EventAction, Kv, KvEvent, MemoryKv, Node, SetOptions, Watcher};
pub use paths::{MinionPaths, MINION_SPACE};
