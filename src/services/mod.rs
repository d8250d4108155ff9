//! Interfaces of the services the cleanup action drives.
//!
//! The action performs no I/O of its own. Everything it learns about the
//! device, and everything it changes, goes through one of these traits:
//!
//! - [`SnapshotManager`]: the snapshot/merge engine
//! - [`BootControl`]: slot state and device feature flags
//! - [`Preferences`]: the durable key-value store of the update pipeline
//! - [`SystemProperties`]: read-only device properties
//! - [`MergeStatsRecorder`]: the merge statistics accumulator
//! - [`MetricsSink`]: where the final merge report goes
//! - [`ActionProcessor`]: the sequencer waiting for the action to finish
//!
//! All traits are synchronous. Implementations must not block for long from
//! inside [`MergeHooks`] callbacks. They are `Send + Sync` so an action can be
//! moved onto a worker task; implementations that need mutation use interior
//! mutability.

use crate::types::ErrorCode;

pub mod boot;
pub mod metrics;
pub mod prefs;
pub mod props;
pub mod snapshot;
pub mod stats;

pub use boot::BootControl;
pub use metrics::{MetricsSink, SnapshotMergeReported, TracingMetricsSink};
pub use prefs::{Preferences, PrefsError};
pub use props::SystemProperties;
pub use snapshot::{MergeHooks, MountedVolume, SnapshotManager, UpdateStatus};
pub use stats::{MergeStatsRecorder, StatsError};

/// Receives the outcome of an action.
pub trait ActionProcessor: Send + Sync {
    /// Called exactly once, when the action reaches a terminal state.
    fn action_complete(&self, code: ErrorCode);
}

/// Observes merge progress.
pub trait CleanupProgressDelegate: Send + Sync {
    /// `progress` is in `[0.0, 1.0]`.
    fn on_cleanup_progress_update(&self, progress: f64);
}
