//! Merge statistics as accumulated during a merge and reported at its end.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::state::{MergeFailureCode, UpdateState};

/// COW space usage of the update being merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CowUsage {
    /// Bytes actually used by COW images.
    pub cow_file_size: u64,
    /// Bytes allocated for COW devices in total.
    pub total_cow_size_bytes: u64,
    /// Bytes the payload estimated it would need.
    pub estimated_cow_size_bytes: u64,
}

/// Snapshot features the update was applied with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeFeatures {
    pub compression_enabled: bool,
    pub userspace_snapshots_used: bool,
    pub xor_compression_used: bool,
    pub iouring_used: bool,
}

/// The accumulated record of one merge.
///
/// This is also the on-disk format of the durable stats file, so every field
/// defaults when absent to keep older files loadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeStatsReport {
    pub state: UpdateState,

    /// How many times the merge was resumed after an interruption.
    pub resume_count: u32,

    #[serde(flatten)]
    pub cow: CowUsage,

    #[serde(flatten)]
    pub features: MergeFeatures,

    pub merge_failure_code: MergeFailureCode,

    pub source_build_fingerprint: String,

    /// Milliseconds since boot at which boot was observed complete.
    pub boot_complete_time_ms: u64,

    /// Milliseconds from boot completion to merge initiation.
    pub boot_complete_to_merge_start_time_ms: u64,
}

impl Default for MergeStatsReport {
    fn default() -> Self {
        MergeStatsReport {
            state: UpdateState::None,
            resume_count: 0,
            cow: CowUsage::default(),
            features: MergeFeatures::default(),
            merge_failure_code: MergeFailureCode::OK,
            source_build_fingerprint: String::new(),
            boot_complete_time_ms: 0,
            boot_complete_to_merge_start_time_ms: 0,
        }
    }
}

/// The immutable result of finishing a stats recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStatsResult {
    pub report: MergeStatsReport,

    /// Wall time spent merging, across resumptions.
    pub merge_time: Duration,
}

impl MergeStatsResult {
    pub fn new(report: MergeStatsReport, merge_time: Duration) -> Self {
        MergeStatsResult { report, merge_time }
    }
}
