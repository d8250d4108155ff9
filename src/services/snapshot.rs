//! The snapshot/merge engine.

use std::path::Path;
use std::sync::Arc;

use super::stats::MergeStatsRecorder;
use crate::types::{CreateResult, MergeFailureCode, RawUpdateState};

/// A mounted metadata partition.
///
/// The partition stays mounted for as long as the value lives; dropping it
/// releases the mount.
pub trait MountedVolume: Send + Sync {
    fn mount_point(&self) -> &Path;
}

/// The update state together with merge progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateStatus {
    pub state: RawUpdateState,

    /// Merge progress in percent, `[0.0, 100.0]`.
    pub progress: f64,
}

/// Callbacks invoked from inside [`SnapshotManager::process_update_state`].
pub trait MergeHooks {
    /// Called repeatedly while a merge is running.
    ///
    /// Returning true asks the snapshot manager to keep waiting inline;
    /// returning false makes it report `Merging` right away.
    fn on_progress(&mut self) -> bool;

    /// Called before the snapshot manager deletes snapshots of a cancelled
    /// update. Returning false keeps the snapshots.
    fn before_cancel(&mut self) -> bool;
}

/// Manages snapshot overlays and the merge that folds them back.
pub trait SnapshotManager: Send + Sync {
    /// The merge stats accumulator owned by the snapshot manager.
    fn merge_stats(&self) -> Option<Arc<dyn MergeStatsRecorder>>;

    /// Mounts the metadata partition, or returns None if it cannot be mounted.
    fn ensure_metadata_mounted(&self) -> Option<Box<dyn MountedVolume>>;

    /// Recreates overlay devices of an unfinished merge. Recovery only.
    fn recovery_create_snapshot_devices(&self, metadata: &dyn MountedVolume) -> CreateResult;

    /// Whether this boot uses the snapshot manager at all.
    fn is_snapshot_manager_needed(&self) -> bool;

    /// Copies the features of the pending update into `stats`.
    fn set_merge_stats_features(&self, stats: &dyn MergeStatsRecorder);

    /// The failure code recorded by the last merge attempt.
    fn read_merge_failure_code(&self) -> MergeFailureCode;

    /// Advances the update state machine by one step and returns the state.
    fn process_update_state(&self, hooks: &mut dyn MergeHooks) -> RawUpdateState;

    /// Reads the current state and merge progress without changing anything.
    fn get_update_state(&self) -> UpdateStatus;

    /// Drops the pending update record. Returns false on failure.
    fn cancel_update(&self) -> bool;

    /// Copies COW usage of the pending update into `stats`.
    fn update_cow_stats(&self, stats: &dyn MergeStatsRecorder);

    /// Build fingerprint of the build the update was applied from.
    fn read_source_build_fingerprint(&self) -> String;

    /// Starts merging. Returns false if the merge could not be started.
    fn initiate_merge(&self) -> bool;
}
