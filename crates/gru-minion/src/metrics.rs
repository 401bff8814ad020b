//! Metric names for the minion agent loops.
//!
//! Metrics are emitted through the `metrics` crate facade; installing an
//! exporter is the embedding binary's concern.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `gru_minion_tasks_total` | Counter | `state` | Tasks reaching a terminal state |
//! | `gru_minion_queue_events_total` | Counter | - | Queue watch events acted on |
//! | `gru_minion_watch_retries_total` | Counter | - | Watch re-establishments after transport errors |
//! | `gru_minion_ticks_total` | Counter | - | Periodic scheduler runs |

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: tasks reaching a terminal state, labeled by that state.
    pub const TASKS_TOTAL: &str = "gru_minion_tasks_total";
    /// Counter: queue watch events acted on.
    pub const QUEUE_EVENTS_TOTAL: &str = "gru_minion_queue_events_total";
    /// Counter: watch re-establishments after transport errors.
    pub const WATCH_RETRIES_TOTAL: &str = "gru_minion_watch_retries_total";
    /// Counter: periodic scheduler runs.
    pub const TICKS_TOTAL: &str = "gru_minion_ticks_total";
}

/// Metric label keys.
pub mod labels {
    /// Terminal state of a task: `success` or `failed`.
    pub const STATE: &str = "state";
}
