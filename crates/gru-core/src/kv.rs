//! Key-value gateway abstraction with watch semantics.
//!
//! This module defines the store contract the minion core consumes. The
//! gateway is deliberately thin: five operations, no policy. Retry and
//! backoff decisions live in callers.
//!
//! - Conditional existence is never checked: `set` is create-or-update
//! - `delete` is idempotent
//! - Watches are recursive over a prefix and deliver an action label plus
//!   the full node, with delete events distinguishable from the rest
//!
//! ## Backends
//!
//! Production deployments implement [`Kv`] over a distributed store;
//! [`MemoryKv`] ships in this crate for tests and single-process use.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// A stored node: a key, its value, and (for recursive gets) its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Full key of the node.
    pub key: String,
    /// Value at the key; empty for pure prefix nodes.
    pub value: String,
    /// Child nodes in lexicographic key order; empty for leaf gets.
    pub nodes: Vec<Node>,
}

impl Node {
    /// Creates a leaf node.
    #[must_use]
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            nodes: Vec::new(),
        }
    }
}

/// Action label carried by a watch event.
///
/// Stores differ in their action vocabulary; only `Delete` carries meaning
/// for the core, and it must be recognizable case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// A key was created.
    Create,
    /// A key was overwritten.
    Update,
    /// A key was deleted.
    Delete,
    /// A key expired from its TTL.
    Expire,
}

impl EventAction {
    /// Returns true if this event signals a removed key.
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Expire => write!(f, "expire"),
        }
    }
}

impl FromStr for EventAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" | "set" => Ok(Self::Create),
            "update" | "compareandswap" => Ok(Self::Update),
            "delete" | "compareanddelete" => Ok(Self::Delete),
            "expire" => Ok(Self::Expire),
            other => Err(Error::InvalidInput(format!(
                "unknown watch action '{other}'"
            ))),
        }
    }
}

/// A single watch notification.
#[derive(Debug, Clone)]
pub struct KvEvent {
    /// What happened to the node.
    pub action: EventAction,
    /// The node the event refers to.
    pub node: Node,
}

/// Options for a `set` operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Time-to-live for the entry; `None` means the entry never expires.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    /// Options for an entry that never expires.
    #[must_use]
    pub const fn none() -> Self {
        Self { ttl: None }
    }

    /// Options carrying a TTL.
    #[must_use]
    pub const fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// A live watch handle over a key prefix.
#[async_trait]
pub trait Watcher: Send {
    /// Awaits the next event on the watched prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the watch stream breaks; callers
    /// decide whether to re-establish it.
    async fn next(&mut self) -> Result<KvEvent>;
}

/// Key-value store interface consumed by the minion core.
///
/// The gateway is stateless and returns errors unchanged.
#[async_trait]
pub trait Kv: Send + Sync + 'static {
    /// Reads a key, or a prefix with its children when `recursive` is set.
    ///
    /// Children are returned in lexicographic key order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when neither the key nor any child exists.
    async fn get(&self, key: &str, recursive: bool) -> Result<Node>;

    /// Writes a value with create-or-update semantics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the store is unreachable.
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<()>;

    /// Deletes a key. Succeeds even if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the store is unreachable.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Establishes a watch over `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when the watch cannot be established.
    async fn watch(&self, prefix: &str, recursive: bool) -> Result<Box<dyn Watcher>>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory store for tests and single-process use.
///
/// Thread-safe via `RwLock`; watch fan-out via a broadcast channel. TTL
/// entries are expired lazily on read, so no sweeper task is needed.
#[derive(Debug, Clone)]
pub struct MemoryKv {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
    events: broadcast::Sender<KvEvent>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKv {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            events,
        }
    }

    /// Returns the remaining TTL of a live entry.
    ///
    /// `None` when the key is absent, expired, or was written without a TTL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let entries = self.entries.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        let now = Instant::now();
        Ok(entries.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                entry.expires_at.map(|at| at - now)
            }
        }))
    }

    fn publish(&self, action: EventAction, node: Node) {
        // No receivers is fine; events are best-effort fan-out.
        let _ = self.events.send(KvEvent { action, node });
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str, recursive: bool) -> Result<Node> {
        let entries = self.entries.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        let now = Instant::now();

        if let Some(entry) = entries.get(key).filter(|e| !e.is_expired(now)) {
            return Ok(Node::leaf(key, entry.value.clone()));
        }

        if recursive {
            let child_prefix = format!("{key}/");
            // BTreeMap iteration is already in lexicographic key order.
            let nodes: Vec<Node> = entries
                .range(child_prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&child_prefix))
                .filter(|(_, e)| !e.is_expired(now))
                .map(|(k, e)| Node::leaf(k.clone(), e.value.clone()))
                .collect();
            if !nodes.is_empty() {
                return Ok(Node {
                    key: key.to_string(),
                    value: String::new(),
                    nodes,
                });
            }
        }

        Err(Error::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<()> {
        let action = {
            let mut entries = self.entries.write().map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?;
            let now = Instant::now();
            let existed = entries.get(key).is_some_and(|e| !e.is_expired(now));
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: options.ttl.map(|ttl| now + ttl),
                },
            );
            if existed {
                EventAction::Update
            } else {
                EventAction::Create
            }
        };
        self.publish(action, Node::leaf(key, value));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = {
            let mut entries = self.entries.write().map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?;
            let now = Instant::now();
            entries
                .remove(key)
                .filter(|entry| !entry.is_expired(now))
        };
        if let Some(entry) = removed {
            self.publish(EventAction::Delete, Node::leaf(key, entry.value));
        }
        Ok(())
    }

    async fn watch(&self, prefix: &str, recursive: bool) -> Result<Box<dyn Watcher>> {
        Ok(Box::new(MemoryWatcher {
            rx: self.events.subscribe(),
            prefix: prefix.to_string(),
            recursive,
        }))
    }
}

struct MemoryWatcher {
    rx: broadcast::Receiver<KvEvent>,
    prefix: String,
    recursive: bool,
}

impl MemoryWatcher {
    fn matches(&self, key: &str) -> bool {
        let Some(rest) = key
            .strip_prefix(&self.prefix)
            .and_then(|r| r.strip_prefix('/'))
        else {
            return key == self.prefix;
        };
        self.recursive || !rest.contains('/')
    }
}

#[async_trait]
impl Watcher for MemoryWatcher {
    async fn next(&mut self) -> Result<KvEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event.node.key) => return Ok(event),
                Ok(_) => {}
                // A slow watcher drops the oldest events rather than erroring.
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::transport("watch stream closed"));
                }
            }
        }
    }
}
