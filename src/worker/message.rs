//! Worker message types for async communication.

/// Messages that can be sent to a merge worker.
///
/// Workers receive these via `tokio::sync::mpsc` and apply them between
/// scheduled tasks, so a message never interrupts a running step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Suspend the action. Its outstanding task is cancelled.
    Suspend,

    /// Resume a suspended action from the top.
    Resume,

    /// Stop the action for good; the worker keeps running until shutdown.
    Terminate,

    /// Request a graceful shutdown of the worker.
    Shutdown,
}
