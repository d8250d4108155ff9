//! Recording implementations of the action's outbound interfaces.

use std::sync::{Mutex, MutexGuard};

use tracing::info;

use crate::services::{ActionProcessor, CleanupProgressDelegate, MetricsSink, SnapshotMergeReported};
use crate::types::ErrorCode;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

type CompletionHook = Box<dyn Fn(ErrorCode) + Send + Sync>;

/// Records every completion it is told about.
#[derive(Default)]
pub struct RecordingProcessor {
    codes: Mutex<Vec<ErrorCode>>,
    on_complete: Mutex<Option<CompletionHook>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` inside every `action_complete` call, before the code is
    /// recorded.
    pub fn on_complete(&self, hook: impl Fn(ErrorCode) + Send + Sync + 'static) {
        *lock(&self.on_complete) = Some(Box::new(hook));
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        lock(&self.codes).clone()
    }

    /// The most recent completion, if any.
    pub fn last(&self) -> Option<ErrorCode> {
        lock(&self.codes).last().copied()
    }
}

impl ActionProcessor for RecordingProcessor {
    fn action_complete(&self, code: ErrorCode) {
        info!(code = %code, "Action completed");
        if let Some(hook) = lock(&self.on_complete).as_ref() {
            hook(code);
        }
        lock(&self.codes).push(code);
    }
}

/// Records progress updates.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    updates: Mutex<Vec<f64>>,
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<f64> {
        lock(&self.updates).clone()
    }
}

impl CleanupProgressDelegate for RecordingDelegate {
    fn on_cleanup_progress_update(&self, progress: f64) {
        lock(&self.updates).push(progress);
    }
}

/// Records emitted merge reports.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<SnapshotMergeReported>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SnapshotMergeReported> {
        lock(&self.events).clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn snapshot_merge_reported(&self, event: &SnapshotMergeReported) {
        lock(&self.events).push(event.clone());
    }
}
