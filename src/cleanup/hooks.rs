//! Callbacks the snapshot manager invokes while processing the update state.

use tracing::{info, warn};

use super::progress::MergeProgress;
use super::reset::reset_update_progress;
use crate::services::prefs::keys;
use crate::services::{CleanupProgressDelegate, MergeHooks, Preferences, SnapshotManager};

/// Borrows the parts of an action the merge callbacks touch.
pub(super) struct CleanupHooks<'a> {
    pub snapshot: &'a dyn SnapshotManager,
    pub prefs: &'a dyn Preferences,
    pub delegate: Option<&'a dyn CleanupProgressDelegate>,
    pub progress: &'a mut MergeProgress,
    pub cancel_failed: &'a mut bool,
}

impl MergeHooks for CleanupHooks<'_> {
    fn on_progress(&mut self) -> bool {
        let percentage = self.snapshot.get_update_state().progress;
        if let Some(delegate) = self.delegate {
            delegate.on_cleanup_progress_update(MergeProgress::fraction(percentage));
        }

        if let Some(whole) = self.progress.record(percentage) {
            info!("Waiting for merge to complete: {}%.", whole);
        }

        // Never wait inline; the state is polled again from a scheduled task.
        false
    }

    fn before_cancel(&mut self) -> bool {
        if reset_update_progress(self.prefs) {
            return true;
        }

        // The reset may not work on a stub store; fall back to checking
        // whether partition metadata was ever written for the update.
        warn!("Update state is Cancelled but cleanup failed.");

        let value = self
            .prefs
            .get_string(keys::DYNAMIC_PARTITION_METADATA_UPDATED)
            .unwrap_or_default();
        if value.is_empty() {
            info!(
                key = keys::DYNAMIC_PARTITION_METADATA_UPDATED,
                "Key is empty, assuming successful cleanup"
            );
            return true;
        }

        warn!(
            key = keys::DYNAMIC_PARTITION_METADATA_UPDATED,
            value = %value,
            "Not deleting snapshots even though update state is Cancelled"
        );
        *self.cancel_failed = true;
        false
    }
}
