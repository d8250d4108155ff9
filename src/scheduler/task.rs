//! Single-slot handle for an action's outstanding task.

use std::time::Duration;

use tracing::{error, info};

use super::{ScheduleError, Scheduler, TaskId};

/// Tracks at most one outstanding task.
///
/// The owner posts through the handle and acknowledges every fired task
/// before acting on it, so the handle never points at a task that already
/// ran. Posting while a task is tracked cancels the tracked one first.
#[derive(Debug, Default)]
pub struct ScheduledTask {
    id: Option<TaskId>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a task is tracked.
    pub fn is_scheduled(&self) -> bool {
        self.id.is_some()
    }

    /// The tracked task, if any.
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Schedules `task` after `delay` and tracks it.
    ///
    /// On failure nothing is tracked.
    pub fn post<T>(
        &mut self,
        scheduler: &dyn Scheduler<T>,
        delay: Duration,
        task: T,
    ) -> Result<TaskId, ScheduleError> {
        if self.is_scheduled() {
            self.cancel(scheduler);
        }
        let id = scheduler.schedule(delay, task)?;
        self.id = Some(id);
        Ok(id)
    }

    /// Records that `fired` is executing.
    ///
    /// Returns true if `fired` was the tracked task. A fired task that is not
    /// tracked is stale: it was cancelled (or forgotten after a failed cancel)
    /// and must not act.
    pub fn acknowledge(&mut self, fired: TaskId) -> bool {
        if self.id == Some(fired) {
            info!(task = %fired, "Executing task");
            self.id = None;
            true
        } else {
            false
        }
    }

    /// Cancels the tracked task, if any, and stops tracking it.
    ///
    /// Tracking is cleared even when the scheduler refuses the cancellation,
    /// so a stale id is never kept around. Returns whether a task was tracked.
    pub fn cancel<T>(&mut self, scheduler: &dyn Scheduler<T>) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        if scheduler.cancel(id) {
            info!(task = %id, "Cancelled pending task");
        } else {
            error!(task = %id, "Unable to cancel pending task");
        }
        true
    }
}
