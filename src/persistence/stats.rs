//! File-backed merge statistics.
//!
//! # Atomic Writes
//!
//! The stats file is written with write-to-temp-then-rename:
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename to `<path>`
//! 4. fsync the directory
//!
//! Readers therefore see either the previous or the new record, never a
//! partial one.
//!
//! # Resumption
//!
//! Merge time is measured on the monotonic clock, which restarts at every
//! boot. The file carries the merge time accumulated by earlier boots, and
//! each boot adds the time since its own `start`.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::fsync::{fsync_file, fsync_parent};
use crate::clock::Clock;
use crate::services::{MergeStatsRecorder, StatsError};
use crate::types::{
    CowUsage, MergeFailureCode, MergeFeatures, MergeStatsReport, MergeStatsResult, UpdateState,
};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the stats file inside the metadata directory.
pub const STATS_FILE_NAME: &str = "merge_stats.json";

/// Result type for stats persistence.
pub type Result<T> = std::result::Result<T, StatsError>;

/// The on-disk record of a running merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMergeStats {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    pub report: MergeStatsReport,

    /// Merge time accumulated up to the write, in milliseconds.
    pub merge_time_ms: u64,
}

impl PersistedMergeStats {
    pub fn new(report: MergeStatsReport, merge_time: Duration) -> Self {
        PersistedMergeStats {
            schema_version: SCHEMA_VERSION,
            report,
            merge_time_ms: duration_ms(merge_time),
        }
    }

    pub fn merge_time(&self) -> Duration {
        Duration::from_millis(self.merge_time_ms)
    }
}

/// Saves `stats` atomically to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if any IO operation fails.
pub fn save_stats_atomic(path: &Path, stats: &PersistedMergeStats) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(stats)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;
    fsync_parent(path)?;

    Ok(())
}

/// Loads the stats file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is malformed, or was written
/// with another schema version.
pub fn load_stats(path: &Path) -> Result<PersistedMergeStats> {
    let bytes = std::fs::read(path)?;
    let stats: PersistedMergeStats = serde_json::from_slice(&bytes)?;

    if stats.schema_version != SCHEMA_VERSION {
        return Err(StatsError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: stats.schema_version,
        });
    }

    Ok(stats)
}

/// Loads the stats file, returning None if it doesn't exist.
pub fn try_load_stats(path: &Path) -> Result<Option<PersistedMergeStats>> {
    match load_stats(path) {
        Ok(stats) => Ok(Some(stats)),
        Err(StatsError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Removes the stats file. Returns false if there was none.
pub fn remove_stats(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            fsync_parent(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    /// Merge time accumulated by earlier boots.
    carried: Duration,
    /// Clock reading at this boot's `start`.
    started_at: Duration,
}

#[derive(Debug, Default)]
struct RecorderState {
    report: MergeStatsReport,
    session: Option<Session>,
}

/// A [`MergeStatsRecorder`] that survives reboots.
///
/// `start` picks up a stats file left by an interrupted merge and counts the
/// resumption. `finish` deletes the file.
pub struct FileMergeStatsRecorder {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    state: Mutex<RecorderState>,
}

impl FileMergeStatsRecorder {
    /// Creates a recorder persisting to `path`.
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        FileMergeStatsRecorder {
            path: path.into(),
            clock,
            state: Mutex::new(RecorderState::default()),
        }
    }

    /// Creates a recorder persisting to [`STATS_FILE_NAME`] inside `dir`.
    pub fn in_dir(dir: &Path, clock: Arc<dyn Clock>) -> Self {
        Self::new(dir.join(STATS_FILE_NAME), clock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The report accumulated so far.
    pub fn report(&self) -> MergeStatsReport {
        self.state().report.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state().session.is_some()
    }

    fn state(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn elapsed(&self, session: Session) -> Duration {
        session.carried + self.clock.now().saturating_sub(session.started_at)
    }

    fn persist(&self, state: &RecorderState, session: Session) -> Result<()> {
        let persisted = PersistedMergeStats::new(state.report.clone(), self.elapsed(session));
        save_stats_atomic(&self.path, &persisted)
    }

    fn load_previous(&self) -> Result<Option<PersistedMergeStats>> {
        match try_load_stats(&self.path) {
            Ok(previous) => Ok(previous),
            Err(e @ (StatsError::Json(_) | StatsError::SchemaMismatch { .. })) => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable merge stats");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl MergeStatsRecorder for FileMergeStatsRecorder {
    fn start(&self) -> Result<()> {
        let mut state = self.state();
        if state.session.is_some() {
            debug!("Merge stats already recording");
            return Ok(());
        }

        let session = match self.load_previous()? {
            Some(previous) => {
                let carried = previous.merge_time();
                state.report = previous.report;
                state.report.resume_count += 1;
                info!(
                    resume_count = state.report.resume_count,
                    merge_time_ms = duration_ms(carried),
                    "Resuming merge stats"
                );
                Session {
                    carried,
                    started_at: self.clock.now(),
                }
            }
            None => {
                state.report.resume_count = 0;
                Session {
                    carried: Duration::ZERO,
                    started_at: self.clock.now(),
                }
            }
        };
        state.session = Some(session);
        self.persist(&state, session)
    }

    fn set_state(&self, update_state: UpdateState) {
        self.state().report.state = update_state;
    }

    fn set_boot_complete_time_ms(&self, ms: u64) {
        self.state().report.boot_complete_time_ms = ms;
    }

    fn boot_complete_time_ms(&self) -> u64 {
        self.state().report.boot_complete_time_ms
    }

    fn set_boot_complete_to_merge_start_time_ms(&self, ms: u64) {
        self.state().report.boot_complete_to_merge_start_time_ms = ms;
    }

    fn set_source_build_fingerprint(&self, fingerprint: &str) {
        self.state().report.source_build_fingerprint = fingerprint.to_string();
    }

    fn set_merge_failure_code(&self, code: MergeFailureCode) {
        self.state().report.merge_failure_code = code;
    }

    fn set_cow_usage(&self, usage: CowUsage) {
        self.state().report.cow = usage;
    }

    fn set_features(&self, features: MergeFeatures) {
        self.state().report.features = features;
    }

    fn write_state(&self) -> Result<()> {
        let state = self.state();
        let session = state.session.ok_or(StatsError::NotStarted)?;
        self.persist(&state, session)
    }

    fn finish(&self) -> Result<MergeStatsResult> {
        let mut state = self.state();
        let session = state.session.take().ok_or(StatsError::NotStarted)?;
        let merge_time = self.elapsed(session);

        if let Err(e) = remove_stats(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove merge stats file");
        }

        let report = std::mem::take(&mut state.report);
        Ok(MergeStatsResult::new(report, merge_time))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
