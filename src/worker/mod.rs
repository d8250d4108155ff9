//! The host event loop for a cleanup action.
//!
//! The cleanup action never blocks: every wait is a task posted to a timer
//! queue. A [`MergeWorker`] owns one action and its queue, sleeps until the
//! next deadline, and hands fired tasks back to the action. The sequencer
//! talks to the worker through [`WorkerMessage`]s.
//!
//! # Architecture
//!
//! - One worker per action, running as a tokio task
//! - All action code runs on the worker task, one task at a time
//! - Suspend/resume/terminate arrive as messages and are applied between tasks
//! - Graceful shutdown via cancellation token or [`WorkerMessage::Shutdown`]
//!
//! # Module Structure
//!
//! - [`message`]: Worker message types for async communication
//! - [`runner`]: The event loop and the handle to a spawned worker

mod message;
mod runner;

pub use message::WorkerMessage;
pub use runner::{MergeWorker, Result, WorkerError, WorkerHandle};
