//! Typed key layout for the per-minion keyspace.
//!
//! All per-minion state hangs under `/gru/minion/<id>`:
//!
//! | Key | Contents |
//! |---|---|
//! | `name` | Current human-readable name |
//! | `lastseen` | Decimal seconds since the Unix epoch |
//! | `classifier/<key>` | Serialized classifier, one-hour TTL |
//! | `queue/<entry>` | Inbound task payload, deleted on receipt |
//! | `log/<task-id>` | Most recent persisted record for a task |

use uuid::Uuid;

use crate::id::MinionId;

/// The keyspace used by minions.
pub const MINION_SPACE: &str = "/gru/minion";

/// Typed key helpers for a single minion.
///
/// Both the agent and the controller construct this from a [`MinionId`] and
/// agree on the layout without any store round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinionPaths {
    root: String,
    queue: String,
    classifier: String,
    log: String,
}

impl MinionPaths {
    /// Creates the key layout for `id`.
    #[must_use]
    pub fn new(id: MinionId) -> Self {
        let root = format!("{MINION_SPACE}/{id}");
        Self {
            queue: format!("{root}/queue"),
            classifier: format!("{root}/classifier"),
            log: format!("{root}/log"),
            root,
        }
    }

    /// Returns the minion root directory.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the inbound task queue prefix.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Returns the classifier prefix.
    #[must_use]
    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    /// Returns the task log prefix.
    #[must_use]
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Returns the key holding the minion name.
    #[must_use]
    pub fn name_key(&self) -> String {
        format!("{}/name", self.root)
    }

    /// Returns the key holding the lastseen timestamp.
    #[must_use]
    pub fn lastseen_key(&self) -> String {
        format!("{}/lastseen", self.root)
    }

    /// Returns the key for a classifier entry.
    #[must_use]
    pub fn classifier_key(&self, key: &str) -> String {
        format!("{}/{key}", self.classifier)
    }

    /// Returns the key for a queue entry.
    #[must_use]
    pub fn queue_key(&self, entry: &str) -> String {
        format!("{}/{entry}", self.queue)
    }

    /// Returns the log key for a task.
    #[must_use]
    pub fn log_key(&self, task_id: Uuid) -> String {
        format!("{}/{task_id}", self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hangs_under_minion_space() {
        let id = MinionId::derive("Kevin");
        let paths = MinionPaths::new(id);

        assert_eq!(paths.root(), format!("/gru/minion/{id}"));
        assert_eq!(paths.queue(), format!("/gru/minion/{id}/queue"));
        assert_eq!(paths.classifier(), format!("/gru/minion/{id}/classifier"));
        assert_eq!(paths.log(), format!("/gru/minion/{id}/log"));
    }

    #[test]
    fn entry_keys_join_their_prefix() {
        let paths = MinionPaths::new(MinionId::derive("Kevin"));
        let task_id = Uuid::new_v4();

        assert!(paths.name_key().ends_with("/name"));
        assert!(paths.lastseen_key().ends_with("/lastseen"));
        assert_eq!(
            paths.classifier_key("os"),
            format!("{}/os", paths.classifier())
        );
        assert_eq!(paths.queue_key("aaa"), format!("{}/aaa", paths.queue()));
        assert_eq!(
            paths.log_key(task_id),
            format!("{}/{task_id}", paths.log())
        );
    }
}
