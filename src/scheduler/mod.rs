//! Delayed-task scheduling.
//!
//! The cleanup action never sleeps or blocks. Every wait is expressed as a
//! task handed to a [`Scheduler`], and the host's event loop hands the task
//! back to the action when it fires.
//!
//! # Module Structure
//!
//! - [`queue`]: [`TimerQueue`], a clock-driven scheduler the host loop drains
//! - [`task`]: [`ScheduledTask`], the single-slot handle an action keeps

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod queue;
mod task;

pub use queue::{FiredTask, TimerQueue};
pub use task::ScheduledTask;

/// Identifier of a scheduled task, unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors returned when a task cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The scheduler no longer accepts tasks.
    #[error("scheduler is closed")]
    Closed,

    /// The scheduler is at capacity.
    #[error("scheduler is full ({0} tasks pending)")]
    Full(usize),
}

/// Posts tasks to run after a delay.
///
/// `T` is the task payload; the scheduler treats it as opaque and returns it
/// unchanged when the task fires.
pub trait Scheduler<T>: Send + Sync {
    /// Schedules `task` to fire after `delay`.
    fn schedule(&self, delay: Duration, task: T) -> Result<TaskId, ScheduleError>;

    /// Cancels a pending task.
    ///
    /// Returns false if the task is unknown, for example because it has
    /// already fired.
    fn cancel(&self, id: TaskId) -> bool;
}
