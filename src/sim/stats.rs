//! In-memory merge stats recorder.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::Clock;
use crate::services::{MergeStatsRecorder, StatsError};
use crate::types::{
    CowUsage, MergeFailureCode, MergeFeatures, MergeStatsReport, MergeStatsResult, UpdateState,
};

#[derive(Debug, Default)]
struct Recording {
    report: MergeStatsReport,
    started_at: Option<Duration>,
    /// Merge time of boots before the last simulated reboot.
    carried: Duration,
    /// Set by a reboot that interrupted a recording.
    interrupted: bool,
    starts: usize,
    writes: usize,
    finishes: usize,
}

/// A [`MergeStatsRecorder`] that keeps everything in memory.
///
/// Starting an already started recorder is a no-op. Only a recording
/// interrupted by [`MemoryStatsRecorder::simulate_reboot`] resumes.
pub struct MemoryStatsRecorder {
    clock: Arc<dyn Clock>,
    recording: Mutex<Recording>,
    fail_writes: AtomicBool,
}

impl MemoryStatsRecorder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryStatsRecorder {
            clock,
            recording: Mutex::new(Recording::default()),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn recording(&self) -> MutexGuard<'_, Recording> {
        self.recording.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `start` and `write_state` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The report accumulated so far.
    pub fn report(&self) -> MergeStatsReport {
        self.recording().report.clone()
    }

    pub fn is_started(&self) -> bool {
        self.recording().started_at.is_some()
    }

    /// Drops the running recording as a reboot would, keeping what a durable
    /// recorder would have persisted. The next `start` resumes it.
    pub fn simulate_reboot(&self) {
        let now = self.clock.now();
        let mut recording = self.recording();
        if let Some(started_at) = recording.started_at.take() {
            recording.carried += now.saturating_sub(started_at);
            recording.interrupted = true;
        }
    }

    pub fn starts(&self) -> usize {
        self.recording().starts
    }

    pub fn writes(&self) -> usize {
        self.recording().writes
    }

    pub fn finishes(&self) -> usize {
        self.recording().finishes
    }

    fn check_writable(&self) -> Result<(), StatsError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(io::Error::other("stats storage unavailable").into())
        } else {
            Ok(())
        }
    }
}

impl MergeStatsRecorder for MemoryStatsRecorder {
    fn start(&self) -> Result<(), StatsError> {
        let now = self.clock.now();
        let mut recording = self.recording();
        recording.starts += 1;
        if recording.started_at.is_none() {
            if std::mem::take(&mut recording.interrupted) {
                recording.report.resume_count += 1;
            }
            recording.started_at = Some(now);
        }
        drop(recording);
        self.check_writable()
    }

    fn set_state(&self, state: UpdateState) {
        self.recording().report.state = state;
    }

    fn set_boot_complete_time_ms(&self, ms: u64) {
        self.recording().report.boot_complete_time_ms = ms;
    }

    fn boot_complete_time_ms(&self) -> u64 {
        self.recording().report.boot_complete_time_ms
    }

    fn set_boot_complete_to_merge_start_time_ms(&self, ms: u64) {
        self.recording().report.boot_complete_to_merge_start_time_ms = ms;
    }

    fn set_source_build_fingerprint(&self, fingerprint: &str) {
        self.recording().report.source_build_fingerprint = fingerprint.to_string();
    }

    fn set_merge_failure_code(&self, code: MergeFailureCode) {
        self.recording().report.merge_failure_code = code;
    }

    fn set_cow_usage(&self, usage: CowUsage) {
        self.recording().report.cow = usage;
    }

    fn set_features(&self, features: MergeFeatures) {
        self.recording().report.features = features;
    }

    fn write_state(&self) -> Result<(), StatsError> {
        self.check_writable()?;
        let mut recording = self.recording();
        if recording.started_at.is_none() {
            return Err(StatsError::NotStarted);
        }
        recording.writes += 1;
        Ok(())
    }

    fn finish(&self) -> Result<MergeStatsResult, StatsError> {
        let now = self.clock.now();
        let mut recording = self.recording();
        recording.finishes += 1;
        let started_at = recording.started_at.take().ok_or(StatsError::NotStarted)?;
        let merge_time = std::mem::take(&mut recording.carried) + now.saturating_sub(started_at);
        let report = std::mem::take(&mut recording.report);
        Ok(MergeStatsResult::new(report, merge_time))
    }
}
