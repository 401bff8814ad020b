//! Shared test utilities for gru integration tests.
//!
//! This crate provides:
//! - [`TracingKv`]: In-memory KV gateway with operation recording and fault
//!   injection (offline mode, broken watches)
//! - [`init_test_logging`]: Tracing bootstrap for test binaries
//!
//! # Example
//!
//! ```rust,ignore
//! use gru_test_utils::TracingKv;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let kv = std::sync::Arc::new(TracingKv::new());
//!     kv.break_watch(true);
//!     // ... assert the watcher backs off ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code.
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use gru_core::error::{Error, Result};
use gru_core::kv::{Kv, KvEvent, MemoryKv, Node, SetOptions, Watcher};

/// Record of a gateway operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    /// Get operation.
    Get {
        /// Key that was read.
        key: String,
        /// Whether children were requested.
        recursive: bool,
    },
    /// Set operation.
    Set {
        /// Key that was written.
        key: String,
        /// TTL carried by the write, if any.
        ttl: Option<Duration>,
    },
    /// Delete operation.
    Delete {
        /// Key that was deleted.
        key: String,
    },
    /// Watch establishment.
    Watch {
        /// Prefix that was watched.
        prefix: String,
    },
}

/// A recorded operation with its (tokio) timestamp.
///
/// Timestamps honor the paused test clock, so backoff gaps can be asserted
/// deterministically under `start_paused`.
#[derive(Debug, Clone)]
pub struct RecordedOp {
    /// The operation.
    pub op: KvOp,
    /// When the gateway saw it.
    pub at: Instant,
}

/// In-memory KV gateway with operation recording and fault injection.
///
/// Wraps [`MemoryKv`] and adds:
/// - an offline switch failing every operation with a transport error
/// - a watch breaker interrupting live watchers with a transport error
/// - an operation journal for assertions
#[derive(Debug, Clone, Default)]
pub struct TracingKv {
    inner: MemoryKv,
    operations: Arc<Mutex<Vec<RecordedOp>>>,
    offline: Arc<AtomicBool>,
    watch_broken: Arc<AtomicBool>,
    fault_changed: Arc<Notify>,
}

impl TracingKv {
    /// Creates a new empty tracing gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped in-memory store, for seeding and TTL inspection.
    pub fn store(&self) -> &MemoryKv {
        &self.inner
    }

    /// Fails every operation with a transport error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        self.fault_changed.notify_waiters();
    }

    /// Breaks live watchers (and watch establishment) while set.
    pub fn break_watch(&self, broken: bool) {
        self.watch_broken.store(broken, Ordering::SeqCst);
        self.fault_changed.notify_waiters();
    }

    /// Returns the recorded operations.
    pub fn operations(&self) -> Vec<RecordedOp> {
        self.operations.lock().unwrap().clone()
    }

    /// Returns the timestamps of recorded watch establishments.
    pub fn watch_attempts(&self) -> Vec<Instant> {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r.op, KvOp::Watch { .. }))
            .map(|r| r.at)
            .collect()
    }

    fn record(&self, op: KvOp) {
        self.operations.lock().unwrap().push(RecordedOp {
            op,
            at: Instant::now(),
        });
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::transport("store offline (injected)"));
        }
        Ok(())
    }
}

#[async_trait]
impl Kv for TracingKv {
    async fn get(&self, key: &str, recursive: bool) -> Result<Node> {
        self.record(KvOp::Get {
            key: key.to_string(),
            recursive,
        });
        self.check_online()?;
        self.inner.get(key, recursive).await
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<()> {
        self.record(KvOp::Set {
            key: key.to_string(),
            ttl: options.ttl,
        });
        self.check_online()?;
        self.inner.set(key, value, options).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record(KvOp::Delete {
            key: key.to_string(),
        });
        self.check_online()?;
        self.inner.delete(key).await
    }

    async fn watch(&self, prefix: &str, recursive: bool) -> Result<Box<dyn Watcher>> {
        self.record(KvOp::Watch {
            prefix: prefix.to_string(),
        });
        self.check_online()?;
        if self.watch_broken.load(Ordering::SeqCst) {
            return Err(Error::transport("watch broken (injected)"));
        }
        let inner = self.inner.watch(prefix, recursive).await?;
        Ok(Box::new(FaultableWatcher {
            inner,
            offline: self.offline.clone(),
            watch_broken: self.watch_broken.clone(),
            fault_changed: self.fault_changed.clone(),
        }))
    }
}

struct FaultableWatcher {
    inner: Box<dyn Watcher>,
    offline: Arc<AtomicBool>,
    watch_broken: Arc<AtomicBool>,
    fault_changed: Arc<Notify>,
}

impl FaultableWatcher {
    fn is_faulted(&self) -> bool {
        self.offline.load(Ordering::SeqCst) || self.watch_broken.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Watcher for FaultableWatcher {
    async fn next(&mut self) -> Result<KvEvent> {
        loop {
            let notified = self.fault_changed.notified();
            // Checked after arming the notification so a fault flipped in
            // between cannot be missed.
            if self.is_faulted() {
                return Err(Error::transport("watch broken (injected)"));
            }
            tokio::select! {
                event = self.inner.next() => return event,
                () = notified => {}
            }
        }
    }
}

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gru_minion=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
