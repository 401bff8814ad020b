//! Durable state writers for the per-minion keyspace.
//!
//! Every writer is a single store round trip with create-or-update
//! semantics; none reads before writing, so all four are idempotent.
//! Failures are logged and returned unchanged; callers decide whether a
//! failed write is fatal (startup) or retryable (periodic refresh).

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use gru_core::error::Result;
use gru_core::kv::{Kv, SetOptions};
use gru_core::paths::MinionPaths;

use crate::classifier::Classifier;
use crate::task::Task;

/// Classifier entries expire an hour after their last refresh.
pub const CLASSIFIER_TTL: Duration = Duration::from_secs(3600);

/// Writes minion state at its canonical keys.
#[derive(Clone)]
pub struct StateWriter {
    kv: Arc<dyn Kv>,
    paths: MinionPaths,
}

impl StateWriter {
    /// Creates a writer for the given minion keyspace.
    #[must_use]
    pub fn new(kv: Arc<dyn Kv>, paths: MinionPaths) -> Self {
        Self { kv, paths }
    }

    /// Persists the human-readable name of the minion.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged after logging it.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        let result = self
            .kv
            .set(&self.paths.name_key(), name, SetOptions::none())
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "failed to set minion name");
        }
        result
    }

    /// Persists the time the minion was last seen, in epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged after logging it.
    pub async fn set_lastseen(&self, secs: i64) -> Result<()> {
        let result = self
            .kv
            .set(
                &self.paths.lastseen_key(),
                &secs.to_string(),
                SetOptions::none(),
            )
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "failed to set lastseen time");
        }
        result
    }

    /// Persists a classifier fact with the one-hour TTL.
    ///
    /// # Errors
    ///
    /// Returns a codec error for unserializable values, or the store error
    /// unchanged after logging it.
    pub async fn set_classifier(&self, classifier: &Classifier) -> Result<()> {
        let payload = classifier.to_json()?;
        let result = self
            .kv
            .set(
                &self.paths.classifier_key(&classifier.key),
                &payload,
                SetOptions::with_ttl(CLASSIFIER_TTL),
            )
            .await;
        if let Err(e) = &result {
            warn!(classifier = %classifier.key, error = %e, "failed to set classifier");
        }
        result
    }

    /// Persists the current record of a task, overwriting any prior record.
    ///
    /// # Errors
    ///
    /// Returns a codec error for unserializable tasks, or the store error
    /// unchanged after logging it.
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        let payload = task.to_json()?;
        let result = self
            .kv
            .set(
                &self.paths.log_key(task.task_id),
                &payload,
                SetOptions::none(),
            )
            .await;
        if let Err(e) = &result {
            warn!(task = %task.task_id, error = %e, "failed to save task");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;
    use gru_core::id::MinionId;
    use gru_core::kv::MemoryKv;

    fn writer() -> (Arc<MemoryKv>, StateWriter, MinionPaths) {
        let kv = Arc::new(MemoryKv::new());
        let paths = MinionPaths::new(MinionId::derive("Kevin"));
        let writer = StateWriter::new(kv.clone(), paths.clone());
        (kv, writer, paths)
    }

    #[tokio::test]
    async fn set_lastseen_writes_decimal_seconds() {
        let (kv, writer, paths) = writer();
        writer.set_lastseen(1_450_357_761).await.unwrap();

        let node = kv.get(&paths.lastseen_key(), false).await.unwrap();
        assert_eq!(node.value, "1450357761");
    }

    #[tokio::test]
    async fn set_name_is_create_or_update() {
        let (kv, writer, paths) = writer();
        writer.set_name("Kevin").await.unwrap();
        writer.set_name("Kevin the Second").await.unwrap();

        let node = kv.get(&paths.name_key(), false).await.unwrap();
        assert_eq!(node.value, "Kevin the Second");
    }

    #[tokio::test]
    async fn set_classifier_carries_the_ttl() {
        let (kv, writer, paths) = writer();
        writer
            .set_classifier(&Classifier::new("os", "linux"))
            .await
            .unwrap();

        let key = paths.classifier_key("os");
        let remaining = kv.ttl_remaining(&key).unwrap().unwrap();
        assert!(remaining <= CLASSIFIER_TTL);
        assert!(remaining > CLASSIFIER_TTL - Duration::from_secs(5));

        let node = kv.get(&key, false).await.unwrap();
        let decoded = Classifier::from_json(&node.value).unwrap();
        assert_eq!(decoded.value, "linux");
    }

    #[tokio::test]
    async fn save_task_overwrites_prior_record() {
        let (kv, writer, paths) = writer();
        let mut task = Task::new(gru_catalog::Catalog::new());

        task.state = TaskState::Queued;
        writer.save_task(&task).await.unwrap();
        task.state = TaskState::Processing;
        writer.save_task(&task).await.unwrap();

        let node = kv.get(&paths.log_key(task.task_id), false).await.unwrap();
        let decoded = Task::from_json(&node.value).unwrap();
        assert_eq!(decoded.state, TaskState::Processing);
    }
}
