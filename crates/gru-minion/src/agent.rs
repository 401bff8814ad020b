//! The minion agent: cooperating loops around one task channel.
//!
//! A serving minion runs five workers:
//!
//! - an initial classification pass
//! - an initial backlog drain
//! - the periodic scheduler (classifier refresh, backlog drain, lastseen)
//! - the task runner consuming the task channel
//! - the queue watcher feeding the task channel
//!
//! The watcher and the drainer both inject tasks into the channel; the
//! runner is the only consumer. The channel is unbuffered, so a busy
//! sequential task backpressures the producers instead of dropping work.
//! Shutdown is cooperative: `stop` flags the done signal and closes the
//! channel, and every worker exits at its next suspension point.

use chrono::Utc;
use metrics::counter;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use gru_core::backoff::Backoff;
use gru_core::error::Result;
use gru_core::id::MinionId;
use gru_core::kv::Kv;
use gru_core::paths::MinionPaths;

use crate::classifier;
use crate::metrics::{labels, names};
use crate::task::{Task, TaskState};
use crate::writer::StateWriter;

/// Cadence of the periodic scheduler.
///
/// Must stay well under the classifier TTL: the scheduler is the only thing
/// keeping classifier entries alive.
pub const TICK_INTERVAL: Duration = Duration::from_secs(300);

/// A minion bound to one store identity and namespace.
///
/// Constructed once, served once. All fields are read-only after
/// construction; the task channel is the only mutable state shared between
/// workers.
pub struct Minion {
    name: String,
    id: MinionId,
    paths: MinionPaths,
    kv: Arc<dyn Kv>,
    writer: StateWriter,
    task_tx: Mutex<Option<mpsc::Sender<Task>>>,
    task_rx: Mutex<Option<mpsc::Receiver<Task>>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Minion {
    /// Creates a minion bound to the keyspace derived from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, kv: Arc<dyn Kv>) -> Arc<Self> {
        let name = name.into();
        let id = MinionId::derive(&name);
        let paths = MinionPaths::new(id);
        let writer = StateWriter::new(kv.clone(), paths.clone());
        let (task_tx, task_rx) = mpsc::channel(1);
        let (done_tx, done_rx) = watch::channel(false);

        Arc::new(Self {
            name,
            id,
            paths,
            kv,
            writer,
            task_tx: Mutex::new(Some(task_tx)),
            task_rx: Mutex::new(Some(task_rx)),
            done_tx,
            done_rx,
        })
    }

    /// Returns the minion identifier.
    #[must_use]
    pub const fn id(&self) -> MinionId {
        self.id
    }

    /// Returns the minion name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the minion key layout.
    #[must_use]
    pub const fn paths(&self) -> &MinionPaths {
        &self.paths
    }

    /// Returns the state writer for this minion.
    #[must_use]
    pub const fn writer(&self) -> &StateWriter {
        &self.writer
    }

    /// Starts serving: registers the minion in the store and spawns the
    /// background workers.
    ///
    /// Returns as soon as the workers are spawned. Single-shot: a stopped
    /// minion cannot serve again.
    ///
    /// # Errors
    ///
    /// Returns the store error if the initial name or lastseen write fails;
    /// no workers are started in that case.
    pub async fn serve(self: &Arc<Self>) -> Result<()> {
        self.writer.set_name(&self.name).await?;
        self.writer.set_lastseen(Utc::now().timestamp()).await?;

        let minion = Arc::clone(self);
        tokio::spawn(async move { minion.classify().await });

        let minion = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = minion.drain_backlog().await {
                warn!(error = %e, "initial backlog drain failed");
            }
        });

        let minion = Arc::clone(self);
        tokio::spawn(async move { minion.periodic_runner().await });

        let minion = Arc::clone(self);
        tokio::spawn(async move { minion.task_runner().await });

        let minion = Arc::clone(self);
        tokio::spawn(async move { minion.task_listener().await });

        info!(id = %self.id, name = %self.name, "minion is ready to serve");
        Ok(())
    }

    /// Stops the minion: closes the task channel and trips the done signal.
    ///
    /// In-flight tasks are not preempted; their terminal log write is still
    /// attempted best-effort.
    pub fn stop(&self) {
        info!(id = %self.id, "minion is shutting down");
        self.task_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        let _ = self.done_tx.send(true);
    }

    /// Awaits the done signal.
    async fn wait_done(done: &mut watch::Receiver<bool>) {
        loop {
            if *done.borrow() {
                return;
            }
            if done.changed().await.is_err() {
                // Sender gone counts as done.
                return;
            }
        }
    }

    /// Refreshes every registered classifier in the store.
    ///
    /// Per-key failures are logged and skipped so one broken provider never
    /// blocks the rest.
    pub async fn classify(&self) {
        for key in classifier::keys() {
            match classifier::get(key) {
                Ok(fact) => {
                    let _ = self.writer.set_classifier(&fact).await;
                }
                Err(e) => {
                    warn!(classifier = %key, error = %e, "failed to get classifier");
                }
            }
        }
    }

    /// Drains pre-existing queue entries into the task channel.
    ///
    /// An absent queue prefix means no pending tasks and is not an error.
    /// Every entry is deleted before its task is handed off; undecodable
    /// entries are deleted and dropped.
    ///
    /// # Errors
    ///
    /// Returns the store error if the queue listing itself fails.
    pub async fn drain_backlog(&self) -> Result<()> {
        let node = match self.kv.get(self.paths.queue(), true).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        if node.nodes.is_empty() {
            return Ok(());
        }

        info!(count = node.nodes.len(), "found pending tasks in queue");
        for entry in node.nodes {
            let decoded = Task::from_json(&entry.value);
            if let Err(e) = self.kv.delete(&entry.key).await {
                warn!(key = %entry.key, error = %e, "failed to remove queue entry");
            }

            match decoded {
                Ok(task) => {
                    if !self.submit(task).await {
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "dropping invalid task");
                }
            }
        }

        Ok(())
    }

    /// Sends a task into the channel, guarded against shutdown.
    ///
    /// Returns false when the minion stopped before the task was accepted.
    async fn submit(&self, task: Task) -> bool {
        let Some(tx) = self
            .task_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
        else {
            return false;
        };

        let mut done = self.done_rx.clone();
        tokio::select! {
            sent = tx.send(task) => sent.is_ok(),
            () = Self::wait_done(&mut done) => false,
        }
    }

    /// Watches the queue prefix and feeds new entries into the channel.
    ///
    /// Transport errors re-establish the watch after a jittered exponential
    /// backoff; any successful event resets the backoff. Delete events are
    /// ignored, since they are the minion's own removals echoing back. The
    /// loop has no non-error exit: it returns only on shutdown.
    async fn task_listener(&self) {
        info!(queue = %self.paths.queue(), "task listener watching queue");
        let mut backoff = Backoff::new();
        let mut done = self.done_rx.clone();

        'establish: loop {
            let mut watcher = match self.kv.watch(self.paths.queue(), true).await {
                Ok(watcher) => watcher,
                Err(e) => {
                    if !self.backoff_sleep(&mut backoff, &e).await {
                        return;
                    }
                    continue 'establish;
                }
            };

            loop {
                let event = tokio::select! {
                    () = Self::wait_done(&mut done) => return,
                    event = watcher.next() => event,
                };

                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        if !self.backoff_sleep(&mut backoff, &e).await {
                            return;
                        }
                        continue 'establish;
                    }
                };

                backoff.reset();

                // Our own queue removals echo back as delete events;
                // re-ingesting those would loop forever.
                if event.action.is_delete() {
                    continue;
                }

                counter!(names::QUEUE_EVENTS_TOTAL).increment(1);
                let decoded = Task::from_json(&event.node.value);
                if let Err(e) = self.kv.delete(&event.node.key).await {
                    warn!(key = %event.node.key, error = %e, "failed to remove queue entry");
                }

                match decoded {
                    Ok(task) => {
                        info!(task = %task.task_id, "received task");
                        if !self.submit(task).await {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(key = %event.node.key, error = %e, "received invalid task");
                    }
                }
            }
        }
    }

    /// Sleeps out one backoff delay; returns false when shutdown interrupted
    /// the sleep.
    async fn backoff_sleep(&self, backoff: &mut Backoff, error: &gru_core::Error) -> bool {
        let delay = backoff.next_delay();
        warn!(error = %error, retry_in = ?delay, "queue watch failed");
        counter!(names::WATCH_RETRIES_TOTAL).increment(1);

        let mut done = self.done_rx.clone();
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = Self::wait_done(&mut done) => false,
        }
    }

    /// Consumes the task channel and drives each task to a terminal state.
    ///
    /// Concurrent tasks are spawned onto their own worker; sequential tasks
    /// block the runner until their terminal log is written.
    async fn task_runner(self: &Arc<Self>) {
        let Some(mut rx) = self
            .task_rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        else {
            warn!("task runner started twice");
            return;
        };

        info!("starting task runner");
        let mut done = self.done_rx.clone();

        loop {
            let task = tokio::select! {
                () = Self::wait_done(&mut done) => break,
                task = rx.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let mut task = task;
            task.state = TaskState::Queued;
            task.time_received = Utc::now().timestamp();
            let _ = self.writer.save_task(&task).await;

            if task.is_concurrent {
                let minion = Arc::clone(self);
                tokio::spawn(async move { minion.process_task(task).await });
            } else {
                self.process_task(task).await;
            }
        }
    }

    /// Executes one task's catalog and persists the terminal record.
    async fn process_task(&self, mut task: Task) {
        task.state = TaskState::Processing;
        let _ = self.writer.save_task(&task).await;

        info!(task = %task.task_id, "processing task");

        let mut sink = String::new();
        // The write into an owned String cannot fail.
        let _ = writeln!(
            sink,
            "Loaded {} resources from catalog",
            task.catalog.len()
        );
        let outcome = task.catalog.run(&mut sink).await;

        task.time_processed = Utc::now().timestamp();
        task.result = sink;
        task.state = match outcome {
            Ok(()) => {
                info!(task = %task.task_id, "finished processing task");
                TaskState::Success
            }
            Err(e) => {
                warn!(task = %task.task_id, error = %e, "failed to process task");
                TaskState::Failed
            }
        };

        counter!(names::TASKS_TOTAL, labels::STATE => task.state.to_string()).increment(1);
        let _ = self.writer.save_task(&task).await;
    }

    /// Runs periodic jobs: classifier refresh, backlog drain, lastseen.
    async fn periodic_runner(&self) {
        info!(interval = ?TICK_INTERVAL, "periodic scheduler running");
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; serve already did this work.
        ticker.tick().await;

        let mut done = self.done_rx.clone();
        loop {
            tokio::select! {
                () = Self::wait_done(&mut done) => return,
                _ = ticker.tick() => {
                    debug!("periodic scheduler tick");
                    self.classify().await;
                    if let Err(e) = self.drain_backlog().await {
                        warn!(error = %e, "periodic backlog drain failed");
                    }
                    let _ = self.writer.set_lastseen(Utc::now().timestamp()).await;
                    counter!(names::TICKS_TOTAL).increment(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gru_core::kv::{MemoryKv, SetOptions};

    fn kevin(kv: &Arc<MemoryKv>) -> Arc<Minion> {
        Minion::new("Kevin", kv.clone() as Arc<dyn Kv>)
    }

    #[tokio::test]
    async fn drain_backlog_on_empty_queue_is_ok() {
        let kv = Arc::new(MemoryKv::new());
        let minion = kevin(&kv);
        minion.drain_backlog().await.unwrap();
    }

    #[tokio::test]
    async fn drain_backlog_deletes_undecodable_entries() {
        let kv = Arc::new(MemoryKv::new());
        let minion = kevin(&kv);
        let key = minion.paths().queue_key("zzz");
        kv.set(&key, "not-a-task", SetOptions::none()).await.unwrap();

        minion.drain_backlog().await.unwrap();
        assert!(kv.get(&key, false).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn submit_after_stop_reports_shutdown() {
        let kv = Arc::new(MemoryKv::new());
        let minion = kevin(&kv);
        minion.stop();
        assert!(!minion.submit(Task::default()).await);
    }

    #[tokio::test]
    async fn serve_fails_without_store() {
        let kv = Arc::new(gru_test_utils::TracingKv::new());
        kv.set_offline(true);
        let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);
        assert!(minion.serve().await.is_err());
    }
}
