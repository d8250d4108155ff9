//! A simulated snapshot manager.
//!
//! The simulation keeps a single update record. Left alone it behaves like a
//! real device: an `Unverified` update starts merging when asked to, every
//! `process_update_state` call while `Merging` advances the merge by a fixed
//! step, and the merge completes at 100%. Tests can override the reported
//! states one call at a time with [`SimSnapshotManager::push_states`].

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::services::{
    MergeHooks, MergeStatsRecorder, MountedVolume, SnapshotManager, UpdateStatus,
};
use crate::types::{
    CowUsage, CreateResult, MergeFailureCode, MergeFeatures, RawUpdateState, UpdateState,
};

/// Default merge progress per processing step, in percent.
const DEFAULT_MERGE_STEP_PERCENT: f64 = 25.0;

/// A mounted simulated metadata partition.
#[derive(Debug)]
pub struct SimMountedVolume {
    mount_point: PathBuf,
    live: Arc<AtomicUsize>,
}

impl MountedVolume for SimMountedVolume {
    fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl Drop for SimMountedVolume {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SimState {
    stats: Option<Arc<dyn MergeStatsRecorder>>,
    needed: bool,
    mount_ok: bool,
    mounts: usize,
    create_result: CreateResult,
    state: RawUpdateState,
    progress: f64,
    merge_step: f64,
    scripted: VecDeque<RawUpdateState>,
    failure_code: MergeFailureCode,
    cancel_ok: bool,
    initiate_ok: bool,
    state_after_failed_initiate: RawUpdateState,
    cow: CowUsage,
    features: MergeFeatures,
    source_fingerprint: String,
    calls: Vec<&'static str>,
}

/// A [`SnapshotManager`] with a scriptable update record.
pub struct SimSnapshotManager {
    state: Mutex<SimState>,
    live_mounts: Arc<AtomicUsize>,
}

impl SimSnapshotManager {
    /// Creates a manager with no pending update that hands out `stats`.
    pub fn new(stats: Option<Arc<dyn MergeStatsRecorder>>) -> Self {
        SimSnapshotManager {
            state: Mutex::new(SimState {
                stats,
                needed: true,
                mount_ok: true,
                mounts: 0,
                create_result: CreateResult::NotCreated,
                state: UpdateState::None.into(),
                progress: 0.0,
                merge_step: DEFAULT_MERGE_STEP_PERCENT,
                scripted: VecDeque::new(),
                failure_code: MergeFailureCode::OK,
                cancel_ok: true,
                initiate_ok: true,
                state_after_failed_initiate: UpdateState::Unverified.into(),
                cow: CowUsage::default(),
                features: MergeFeatures::default(),
                source_fingerprint: String::new(),
                calls: Vec::new(),
            }),
            live_mounts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: &'static str) -> MutexGuard<'_, SimState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    /// Replaces the stats recorder handed out by `merge_stats`.
    pub fn set_stats(&self, stats: Option<Arc<dyn MergeStatsRecorder>>) {
        self.state().stats = stats;
    }

    /// Sets the current update state.
    pub fn set_update_state(&self, state: impl Into<RawUpdateState>) {
        self.state().state = state.into();
    }

    /// Queues states reported by the next `process_update_state` calls.
    pub fn push_states(&self, states: impl IntoIterator<Item = RawUpdateState>) {
        self.state().scripted.extend(states);
    }

    /// Sets the merge progress in percent.
    pub fn set_progress(&self, progress: f64) {
        self.state().progress = progress;
    }

    /// Sets how far each processing step advances a running merge.
    pub fn set_merge_step(&self, percent: f64) {
        self.state().merge_step = percent;
    }

    pub fn set_needed(&self, needed: bool) {
        self.state().needed = needed;
    }

    pub fn set_mount_ok(&self, ok: bool) {
        self.state().mount_ok = ok;
    }

    pub fn set_create_result(&self, result: CreateResult) {
        self.state().create_result = result;
    }

    pub fn set_failure_code(&self, code: MergeFailureCode) {
        self.state().failure_code = code;
    }

    pub fn set_cancel_ok(&self, ok: bool) {
        self.state().cancel_ok = ok;
    }

    /// Makes `initiate_merge` fail and leave the record in `state_after`.
    pub fn fail_initiate(&self, state_after: impl Into<RawUpdateState>) {
        let mut state = self.state();
        state.initiate_ok = false;
        state.state_after_failed_initiate = state_after.into();
    }

    pub fn set_cow_usage(&self, cow: CowUsage) {
        self.state().cow = cow;
    }

    pub fn set_features(&self, features: MergeFeatures) {
        self.state().features = features;
    }

    pub fn set_source_fingerprint(&self, fingerprint: impl Into<String>) {
        self.state().source_fingerprint = fingerprint.into();
    }

    /// Names of the service calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    /// Number of times `call` was made.
    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    /// Number of metadata mounts handed out.
    pub fn mounts(&self) -> usize {
        self.state().mounts
    }

    /// Number of metadata mounts currently held.
    pub fn live_mounts(&self) -> usize {
        self.live_mounts.load(Ordering::SeqCst)
    }

    pub fn update_state(&self) -> RawUpdateState {
        self.state().state
    }
}

impl SnapshotManager for SimSnapshotManager {
    fn merge_stats(&self) -> Option<Arc<dyn MergeStatsRecorder>> {
        self.record("merge_stats").stats.clone()
    }

    fn ensure_metadata_mounted(&self) -> Option<Box<dyn MountedVolume>> {
        let mut state = self.record("ensure_metadata_mounted");
        if !state.mount_ok {
            return None;
        }
        state.mounts += 1;
        self.live_mounts.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(SimMountedVolume {
            mount_point: PathBuf::from("/metadata"),
            live: Arc::clone(&self.live_mounts),
        }))
    }

    fn recovery_create_snapshot_devices(&self, _metadata: &dyn MountedVolume) -> CreateResult {
        self.record("recovery_create_snapshot_devices").create_result
    }

    fn is_snapshot_manager_needed(&self) -> bool {
        self.record("is_snapshot_manager_needed").needed
    }

    fn set_merge_stats_features(&self, stats: &dyn MergeStatsRecorder) {
        let features = self.record("set_merge_stats_features").features;
        stats.set_features(features);
    }

    fn read_merge_failure_code(&self) -> MergeFailureCode {
        self.record("read_merge_failure_code").failure_code
    }

    fn process_update_state(&self, hooks: &mut dyn MergeHooks) -> RawUpdateState {
        let raw = {
            let mut state = self.record("process_update_state");
            if let Some(next) = state.scripted.pop_front() {
                state.state = next;
            } else if state.state == RawUpdateState::from(UpdateState::Merging) {
                state.progress = (state.progress + state.merge_step).min(100.0);
                if state.progress >= 100.0 {
                    state.state = UpdateState::MergeCompleted.into();
                }
            }
            state.state
        };

        // Hooks call back into the manager, so the lock must not be held.
        match UpdateState::try_from(raw) {
            Ok(UpdateState::Merging) => {
                hooks.on_progress();
            }
            Ok(UpdateState::Cancelled) => {
                if hooks.before_cancel() {
                    self.state().state = UpdateState::None.into();
                }
            }
            _ => {}
        }
        raw
    }

    fn get_update_state(&self) -> UpdateStatus {
        let state = self.record("get_update_state");
        UpdateStatus {
            state: state.state,
            progress: state.progress,
        }
    }

    fn cancel_update(&self) -> bool {
        let mut state = self.record("cancel_update");
        if state.cancel_ok {
            state.state = UpdateState::None.into();
        }
        state.cancel_ok
    }

    fn update_cow_stats(&self, stats: &dyn MergeStatsRecorder) {
        let cow = self.record("update_cow_stats").cow;
        stats.set_cow_usage(cow);
    }

    fn read_source_build_fingerprint(&self) -> String {
        self.record("read_source_build_fingerprint")
            .source_fingerprint
            .clone()
    }

    fn initiate_merge(&self) -> bool {
        let mut state = self.record("initiate_merge");
        if !state.initiate_ok {
            state.state = state.state_after_failed_initiate;
            return false;
        }
        if state.state == RawUpdateState::from(UpdateState::Unverified) {
            state.state = UpdateState::Merging.into();
            state.progress = 0.0;
        }
        true
    }
}
