//! The merge statistics accumulator.

use std::io;

use thiserror::Error;

use crate::types::{CowUsage, MergeFailureCode, MergeFeatures, MergeStatsResult, UpdateState};

/// Errors returned by a stats recorder.
#[derive(Debug, Error)]
pub enum StatsError {
    /// IO error while persisting stats.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The persisted stats could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persisted stats were written by an incompatible version.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    /// `finish` or `write_state` was called before `start`.
    #[error("merge stats recording was not started")]
    NotStarted,
}

/// Accumulates statistics for one merge.
///
/// The recorder belongs to the snapshot manager and is shared with the
/// cleanup action, hence `&self` setters.
pub trait MergeStatsRecorder: Send + Sync {
    /// Starts (or resumes) recording.
    fn start(&self) -> Result<(), StatsError>;

    fn set_state(&self, state: UpdateState);

    fn set_boot_complete_time_ms(&self, ms: u64);

    fn boot_complete_time_ms(&self) -> u64;

    fn set_boot_complete_to_merge_start_time_ms(&self, ms: u64);

    fn set_source_build_fingerprint(&self, fingerprint: &str);

    fn set_merge_failure_code(&self, code: MergeFailureCode);

    fn set_cow_usage(&self, usage: CowUsage);

    fn set_features(&self, features: MergeFeatures);

    /// Persists the accumulated stats so they survive a restart.
    fn write_state(&self) -> Result<(), StatsError>;

    /// Stops recording and returns the final report.
    fn finish(&self) -> Result<MergeStatsResult, StatsError>;
}
