//! Task records and their wire codec.
//!
//! The same JSON shape is used for inbound queue entries and outbound log
//! records. Producers may omit everything except `task_id`; missing fields
//! default on decode so older controllers keep working.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gru_catalog::Catalog;
use gru_core::error::{Error, Result};

/// Execution state of a task.
///
/// States progress `queued → processing → {success|failed}`; the minion
/// never writes an earlier state over a later one for the same task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Received by the minion, not yet picked up for processing.
    #[default]
    Queued,
    /// The catalog is executing.
    Processing,
    /// The catalog ran to completion.
    Success,
    /// The catalog returned an error.
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of work dispatched to a minion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    #[serde(default)]
    pub task_id: Uuid,
    /// The catalog to execute.
    #[serde(default)]
    pub catalog: Catalog,
    /// Whether this task may run alongside others.
    #[serde(default)]
    pub is_concurrent: bool,
    /// Current execution state.
    #[serde(default)]
    pub state: TaskState,
    /// Epoch seconds when the minion received the task; zero when unset.
    #[serde(default)]
    pub time_received: i64,
    /// Epoch seconds when processing finished; zero when unset.
    #[serde(default)]
    pub time_processed: i64,
    /// Captured execution output.
    #[serde(default)]
    pub result: String,
}

impl Task {
    /// Creates a new task with a fresh identifier.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            catalog,
            ..Self::default()
        }
    }

    /// Marks the task as safe to run concurrently.
    #[must_use]
    pub const fn concurrent(mut self) -> Self {
        self.is_concurrent = true;
        self
    }

    /// Encodes the task for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if the task cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::codec(e.to_string()))
    }

    /// Decodes a task from its wire form.
    ///
    /// All fields except well-formed JSON structure are optional; absent
    /// fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on malformed input. Callers treat this as
    /// ignorable: the offending queue entry is still deleted.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| Error::codec(e.to_string()))
    }
}
