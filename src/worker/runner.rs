//! The merge worker's event loop.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::message::WorkerMessage;
use crate::cleanup::{CleanupServices, CleanupStep, MergeCleanupAction};
use crate::config::CleanupConfig;
use crate::scheduler::TimerQueue;
use crate::types::ErrorCode;

/// Capacity of a worker's message channel.
const CHANNEL_CAPACITY: usize = 16;

/// Errors that can occur when talking to a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker has stopped and no longer accepts messages.
    #[error("worker is no longer running")]
    Closed,

    /// The worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Join(#[from] JoinError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Runs one cleanup action to completion.
pub struct MergeWorker {
    action: MergeCleanupAction,
    queue: Arc<TimerQueue<CleanupStep>>,
}

impl MergeWorker {
    /// Creates a worker for a new cleanup action.
    ///
    /// Deadlines are measured with the services' clock, so it must advance at
    /// the rate tokio's timers do.
    pub fn new(config: CleanupConfig, services: CleanupServices) -> Self {
        let queue = Arc::new(TimerQueue::new(services.clock.clone()));
        let action = MergeCleanupAction::new(config, services, queue.clone());
        MergeWorker { action, queue }
    }

    pub fn action(&self) -> &MergeCleanupAction {
        &self.action
    }

    /// Spawns the worker on the current runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(rx, shutdown.clone()));
        WorkerHandle { tx, shutdown, task }
    }

    // ─── Async Event Loop ────────────────────────────────────────────────────

    /// Runs the worker event loop.
    ///
    /// Starts the action, then applies messages and fires due tasks until the
    /// action completes or the worker is shut down. Returns the action's
    /// completion code, or None if the worker stopped first.
    #[instrument(skip_all, name = "merge_worker")]
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<WorkerMessage>,
        shutdown: CancellationToken,
    ) -> Option<ErrorCode> {
        info!("Worker event loop started");
        self.action.perform_action();

        loop {
            if let Some(code) = self.action.outcome() {
                info!(code = %code, "Cleanup action finished");
                break;
            }

            let next_wakeup = self.queue.time_until_next();

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping worker");
                    break;
                }

                msg = rx.recv() => {
                    match msg {
                        Some(WorkerMessage::Shutdown) => {
                            info!("Shutdown message received");
                            break;
                        }
                        Some(msg) => self.handle_message(msg),
                        None => {
                            info!("Message channel closed");
                            break;
                        }
                    }
                }

                _ = sleep_until_due(next_wakeup) => {
                    self.fire_due_tasks();
                }
            }
        }

        let outcome = self.action.outcome();
        if outcome.is_none() {
            self.action.terminate_processing();
        }
        self.queue.close();

        info!("Worker event loop stopped");
        outcome
    }

    fn handle_message(&mut self, msg: WorkerMessage) {
        debug!(?msg, "Handling worker message");
        match msg {
            WorkerMessage::Suspend => self.action.suspend_action(),
            WorkerMessage::Resume => self.action.resume_action(),
            WorkerMessage::Terminate => self.action.terminate_processing(),
            WorkerMessage::Shutdown => {}
        }
    }

    fn fire_due_tasks(&mut self) {
        for fired in self.queue.take_due() {
            self.action.run_task(fired.id, fired.task);
            if self.action.outcome().is_some() {
                break;
            }
        }
    }
}

async fn sleep_until_due(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

/// Handle to a spawned [`MergeWorker`].
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    shutdown: CancellationToken,
    task: JoinHandle<Option<ErrorCode>>,
}

impl WorkerHandle {
    pub async fn send(&self, msg: WorkerMessage) -> Result<()> {
        self.tx.send(msg).await.map_err(|_| WorkerError::Closed)
    }

    pub async fn suspend(&self) -> Result<()> {
        self.send(WorkerMessage::Suspend).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(WorkerMessage::Resume).await
    }

    pub async fn terminate(&self) -> Result<()> {
        self.send(WorkerMessage::Terminate).await
    }

    /// A token that stops the worker when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits for the action to finish on its own.
    pub async fn wait(self) -> Result<Option<ErrorCode>> {
        Ok(self.task.await?)
    }

    /// Stops the worker and returns the action's outcome, if it had one.
    pub async fn shutdown(self) -> Result<Option<ErrorCode>> {
        if self.tx.send(WorkerMessage::Shutdown).await.is_err() {
            warn!("Worker already stopped");
        }
        self.shutdown.cancel();
        Ok(self.task.await?)
    }
}
