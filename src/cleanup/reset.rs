//! Resetting the payload pipeline's progress record.

use tracing::{info, warn};

use crate::services::Preferences;
use crate::services::prefs::keys;

/// Marker stored as the next operation when no update is in progress.
const UPDATE_STATE_OPERATION_INVALID: i64 = -1;

/// Forgets all progress of a partially applied update.
///
/// Only resetting the next-operation marker is required; the remaining keys
/// are reset on a best-effort basis. Returns false if the marker could not be
/// reset.
pub fn reset_update_progress(prefs: &dyn Preferences) -> bool {
    if let Err(e) = prefs.set_i64(
        keys::UPDATE_STATE_NEXT_OPERATION,
        UPDATE_STATE_OPERATION_INVALID,
    ) {
        warn!(error = %e, "Failed to reset update progress");
        return false;
    }

    let results = [
        prefs.set_i64(keys::UPDATE_STATE_NEXT_DATA_OFFSET, -1),
        prefs.set_i64(keys::UPDATE_STATE_NEXT_DATA_LENGTH, 0),
        prefs.set_string(keys::UPDATE_STATE_SHA256_CONTEXT, ""),
        prefs.set_string(keys::UPDATE_STATE_SIGNED_SHA256_CONTEXT, ""),
        prefs.set_string(keys::UPDATE_STATE_SIGNATURE_BLOB, ""),
        prefs.set_i64(keys::MANIFEST_METADATA_SIZE, -1),
        prefs.set_i64(keys::MANIFEST_SIGNATURE_SIZE, -1),
        prefs.set_i64(keys::RESUMED_UPDATE_FAILURES, 0),
        prefs.delete(keys::POST_INSTALL_SUCCEEDED),
        prefs.delete(keys::VERITY_WRITTEN),
    ];
    for e in results.into_iter().filter_map(Result::err) {
        warn!(error = %e, "Ignoring failure while resetting update progress");
    }

    info!("Resetting recorded hash for prepared partitions.");
    if let Err(e) = prefs.delete(keys::DYNAMIC_PARTITION_METADATA_UPDATED) {
        warn!(error = %e, "Ignoring failure while resetting update progress");
    }
    true
}
