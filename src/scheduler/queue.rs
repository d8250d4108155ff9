//! A clock-driven timer queue.
//!
//! The queue only records deadlines. Whoever owns it (the worker's event loop,
//! or a test advancing a manual clock) asks for [`TimerQueue::time_until_next`],
//! waits that long, and then drains [`TimerQueue::take_due`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::trace;

use super::{ScheduleError, Scheduler, TaskId};
use crate::clock::Clock;

/// A task whose deadline has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTask<T> {
    pub id: TaskId,
    pub task: T,
}

#[derive(Debug)]
struct PendingTimer<T> {
    fires_at: Duration,
    id: TaskId,
    task: T,
}

#[derive(Debug)]
struct QueueState<T> {
    next_id: u64,
    pending: Vec<PendingTimer<T>>,
    closed: bool,
}

/// A [`Scheduler`] backed by an in-memory list of deadlines.
pub struct TimerQueue<T> {
    clock: Arc<dyn Clock>,
    capacity: usize,
    state: Mutex<QueueState<T>>,
}

impl<T> TimerQueue<T> {
    /// Default maximum number of pending tasks.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates an empty queue measuring deadlines with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, Self::DEFAULT_CAPACITY)
    }

    /// Creates an empty queue that rejects tasks beyond `capacity`.
    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        TimerQueue {
            clock,
            capacity,
            state: Mutex::new(QueueState {
                next_id: 1,
                pending: Vec::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Returns true if `id` is still pending.
    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().pending.iter().any(|t| t.id == id)
    }

    /// Returns the delay the task `id` was scheduled with, measured from now.
    pub fn remaining(&self, id: TaskId) -> Option<Duration> {
        let now = self.clock.now();
        self.lock()
            .pending
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.fires_at.saturating_sub(now))
    }

    /// Returns the time until the earliest pending task fires, if any.
    pub fn time_until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.lock()
            .pending
            .iter()
            .map(|t| t.fires_at)
            .min()
            .map(|fires_at| fires_at.saturating_sub(now))
    }

    /// Removes and returns every task due at the clock's current time.
    ///
    /// Tasks come out in deadline order; tasks sharing a deadline come out in
    /// the order they were scheduled.
    pub fn take_due(&self) -> Vec<FiredTask<T>> {
        let now = self.clock.now();
        let mut state = self.lock();

        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|t| t.fires_at <= now);
        state.pending = pending;

        due.sort_by_key(|t| (t.fires_at, t.id));
        due.into_iter()
            .map(|t| FiredTask {
                id: t.id,
                task: t.task,
            })
            .collect()
    }

    /// Stops accepting tasks and drops everything pending.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.pending.clear();
    }
}

impl<T: Send> Scheduler<T> for TimerQueue<T> {
    fn schedule(&self, delay: Duration, task: T) -> Result<TaskId, ScheduleError> {
        let fires_at = self.clock.now() + delay;
        let mut state = self.lock();

        if state.closed {
            return Err(ScheduleError::Closed);
        }
        if state.pending.len() >= self.capacity {
            return Err(ScheduleError::Full(state.pending.len()));
        }

        let id = TaskId(state.next_id);
        state.next_id += 1;
        state.pending.push(PendingTimer { fires_at, id, task });

        trace!(task = %id, ?delay, "Queued timer");
        Ok(id)
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|t| t.id != id);
        state.pending.len() != before
    }
}
