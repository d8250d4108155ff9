//! The cleanup action state machine.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::hooks::CleanupHooks;
use super::progress::MergeProgress;
use super::report::report_merge_stats;
use super::step::CleanupStep;
use crate::clock::Clock;
use crate::config::CleanupConfig;
use crate::scheduler::{ScheduledTask, Scheduler, TaskId};
use crate::services::props;
use crate::services::{
    ActionProcessor, BootControl, CleanupProgressDelegate, MergeStatsRecorder, MetricsSink,
    MountedVolume, Preferences, SnapshotManager, SystemProperties,
};
use crate::types::{CreateResult, ErrorCode, RawUpdateState, UpdateState};

/// The services a cleanup action talks to.
#[derive(Clone)]
pub struct CleanupServices {
    pub snapshot: Arc<dyn SnapshotManager>,
    pub boot_control: Arc<dyn BootControl>,
    pub prefs: Arc<dyn Preferences>,
    pub properties: Arc<dyn SystemProperties>,
    pub processor: Arc<dyn ActionProcessor>,
    pub metrics: Arc<dyn MetricsSink>,
    /// Time since boot.
    pub clock: Arc<dyn Clock>,
    pub delegate: Option<Arc<dyn CleanupProgressDelegate>>,
}

/// Externally visible lifecycle of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Never started.
    Idle,
    /// Started or resumed; scheduled tasks may act.
    Running,
    /// Suspended or terminated before completing.
    Stopped,
    /// Finished with the given code. Terminal.
    Completed(ErrorCode),
}

enum Lifecycle {
    Idle,
    /// Holding the merge stats recorder is what makes an action runnable.
    Running {
        stats: Arc<dyn MergeStatsRecorder>,
    },
    Stopped,
    Completed(ErrorCode),
}

/// Drives a pending snapshot merge to completion.
///
/// The action is passive: the sequencer starts, suspends, resumes and
/// terminates it, and the host's event loop hands back every task the action
/// posted through [`MergeCleanupAction::run_task`]. The final outcome goes to
/// [`ActionProcessor::action_complete`].
pub struct MergeCleanupAction {
    config: CleanupConfig,
    services: CleanupServices,
    scheduler: Arc<dyn Scheduler<CleanupStep>>,
    lifecycle: Lifecycle,
    cancel_failed: bool,
    progress: MergeProgress,
    scheduled_task: ScheduledTask,
    metadata_mount: Option<Box<dyn MountedVolume>>,
}

impl MergeCleanupAction {
    pub fn new(
        config: CleanupConfig,
        services: CleanupServices,
        scheduler: Arc<dyn Scheduler<CleanupStep>>,
    ) -> Self {
        MergeCleanupAction {
            config,
            services,
            scheduler,
            lifecycle: Lifecycle::Idle,
            cancel_failed: false,
            progress: MergeProgress::new(),
            scheduled_task: ScheduledTask::new(),
            metadata_mount: None,
        }
    }

    /// The action's type name, as known to the sequencer.
    pub fn action_type() -> &'static str {
        "MergeCleanupAction"
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    pub fn state(&self) -> ActionState {
        match self.lifecycle {
            Lifecycle::Idle => ActionState::Idle,
            Lifecycle::Running { .. } => ActionState::Running,
            Lifecycle::Stopped => ActionState::Stopped,
            Lifecycle::Completed(code) => ActionState::Completed(code),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. })
    }

    /// The completion code, once the action has completed.
    pub fn outcome(&self) -> Option<ErrorCode> {
        match self.lifecycle {
            Lifecycle::Completed(code) => Some(code),
            _ => None,
        }
    }

    /// The outstanding task, if any.
    pub fn scheduled_task(&self) -> Option<TaskId> {
        self.scheduled_task.id()
    }

    /// Whether a cancellation was refused during this action's lifetime.
    pub fn cancel_failed(&self) -> bool {
        self.cancel_failed
    }

    /// Whether the metadata partition is currently held mounted.
    pub fn holds_metadata_mount(&self) -> bool {
        self.metadata_mount.is_some()
    }

    /// The last merge percentage that was logged.
    pub fn last_logged_percentage(&self) -> u32 {
        self.progress.last_logged()
    }

    // ─── Sequencer Entry Points ──────────────────────────────────────────────

    pub fn perform_action(&mut self) {
        self.start_internal();
    }

    pub fn resume_action(&mut self) {
        self.start_internal();
    }

    pub fn suspend_action(&mut self) {
        self.stop_internal();
    }

    pub fn terminate_processing(&mut self) {
        self.stop_internal();
    }

    /// Runs a task this action scheduled.
    ///
    /// Tasks that are no longer tracked (cancelled, or replaced after a failed
    /// cancellation) and tasks firing while the action is not running are
    /// ignored.
    pub fn run_task(&mut self, id: TaskId, step: CleanupStep) {
        if !self.scheduled_task.acknowledge(id) {
            debug!(task = %id, step = %step, "Ignoring stale task");
            return;
        }
        match step {
            CleanupStep::WaitBootCompleted => self.wait_boot_completed_or_schedule(),
            CleanupStep::CheckSlotMarkedSuccessful => {
                self.check_slot_marked_successful_or_schedule()
            }
            CleanupStep::StartMerge => self.start_merge(),
            CleanupStep::WaitForMerge => self.wait_for_merge_or_schedule(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    fn start_internal(&mut self) {
        if let Lifecycle::Completed(code) = self.lifecycle {
            warn!(code = %code, "Ignoring start of a completed cleanup action");
            return;
        }

        info!("Starting/resuming merge cleanup");
        // Resuming re-derives everything, so nothing from before may fire.
        self.scheduled_task.cancel(self.scheduler.as_ref());

        if !self
            .services
            .boot_control
            .virtual_ab_feature_flag()
            .is_enabled()
        {
            info!("Virtual A/B is not enabled, nothing to clean up");
            self.action_complete(ErrorCode::Success);
            return;
        }

        let Some(stats) = self.services.snapshot.merge_stats() else {
            error!("Snapshot manager has no merge stats recorder");
            self.action_complete(ErrorCode::Error);
            return;
        };
        self.lifecycle = Lifecycle::Running { stats };
        self.wait_boot_completed_or_schedule();
    }

    fn stop_internal(&mut self) {
        info!("Stopping/suspending/completing merge cleanup");
        if matches!(self.lifecycle, Lifecycle::Running { .. }) {
            self.lifecycle = Lifecycle::Stopped;
        }
        self.scheduled_task.cancel(self.scheduler.as_ref());
    }

    fn action_complete(&mut self, code: ErrorCode) {
        if let Lifecycle::Completed(previous) = self.lifecycle {
            warn!(previous = %previous, code = %code, "Cleanup action already completed");
            return;
        }

        let stats = match std::mem::replace(&mut self.lifecycle, Lifecycle::Completed(code)) {
            Lifecycle::Running { stats } => Some(stats),
            _ => None,
        };
        self.scheduled_task.cancel(self.scheduler.as_ref());
        info!(code = %code, "Merge cleanup completed");

        if let Some(stats) = stats {
            report_merge_stats(
                stats.as_ref(),
                &self.config,
                self.services.boot_control.as_ref(),
                self.services.properties.as_ref(),
                self.services.metrics.as_ref(),
            );
        }
        self.metadata_mount = None;

        self.services.processor.action_complete(code);
    }

    /// The stats recorder, if the action is running.
    fn running_stats(&self) -> Option<Arc<dyn MergeStatsRecorder>> {
        match &self.lifecycle {
            Lifecycle::Running { stats } => Some(Arc::clone(stats)),
            _ => None,
        }
    }

    fn schedule(&mut self, step: CleanupStep, delay: Duration) {
        if !self.is_running() {
            return;
        }
        match self
            .scheduled_task
            .post(self.scheduler.as_ref(), delay, step)
        {
            Ok(id) => {
                info!(task = %id, step = %step, ?delay, "Scheduled task");
            }
            Err(e) => {
                error!(step = %step, error = %e, "Unable to schedule task");
                self.action_complete(ErrorCode::Error);
            }
        }
    }

    // ─── State Machine ───────────────────────────────────────────────────────

    fn wait_boot_completed_or_schedule(&mut self) {
        let Some(stats) = self.running_stats() else {
            return;
        };
        if !self.config.context.is_recovery()
            && !self
                .services
                .properties
                .get_bool(props::BOOT_COMPLETED, false)
        {
            self.schedule(
                CleanupStep::WaitBootCompleted,
                self.config.boot_completed_interval,
            );
            return;
        }

        stats.set_boot_complete_time_ms(duration_ms(self.services.clock.now()));

        info!("Boot completed, waiting on slot verification");
        self.check_slot_marked_successful_or_schedule();
    }

    fn check_slot_marked_successful_or_schedule(&mut self) {
        if !self.is_running() {
            return;
        }
        let boot_control = self.services.boot_control.as_ref();
        if !self.config.context.is_recovery()
            && !boot_control.is_slot_marked_successful(boot_control.current_slot())
        {
            self.schedule(
                CleanupStep::CheckSlotMarkedSuccessful,
                self.config.slot_marked_successful_interval,
            );
            return;
        }
        self.check_for_merge_delay();
    }

    fn check_for_merge_delay(&mut self) {
        if !self.services.snapshot.is_snapshot_manager_needed() {
            self.start_merge();
            return;
        }

        let configured = self
            .services
            .properties
            .get_i64(props::MERGE_DELAY_SECONDS, 0);
        let delay = self.config.clamp_merge_delay(configured);
        if !delay.is_zero() {
            info!(
                "Merge is ready to start, but {} is set, delaying merge by {} seconds",
                props::MERGE_DELAY_SECONDS,
                delay.as_secs()
            );
        }
        self.schedule(CleanupStep::StartMerge, delay);
    }

    fn start_merge(&mut self) {
        let Some(stats) = self.running_stats() else {
            return;
        };
        let recovery = self.config.context.is_recovery();

        if self.metadata_mount.is_none() {
            self.metadata_mount = self.services.snapshot.ensure_metadata_mounted();
        }
        let Some(metadata) = self.metadata_mount.as_deref() else {
            error!("Failed to mount /metadata.");
            // An erased but unformatted metadata partition cannot be mounted
            // in recovery; there is nothing to clean up then.
            self.action_complete(if recovery {
                ErrorCode::Success
            } else {
                ErrorCode::Error
            });
            return;
        };

        if recovery {
            match self
                .services
                .snapshot
                .recovery_create_snapshot_devices(metadata)
            {
                CreateResult::Created => info!("Snapshot devices are created"),
                CreateResult::NotCreated => info!("Snapshot devices are not created"),
                CreateResult::Error => {
                    error!("Failed to create snapshot devices");
                    self.action_complete(ErrorCode::Error);
                    return;
                }
            }
        }

        // The merge may continue in the background while this action is
        // suspended, so a failed start is not fatal.
        if let Err(e) = stats.start() {
            warn!(error = %e, "Starting merge stats failed");
        }
        info!(
            "Waiting for any previous merge request to complete. This can take up to several minutes."
        );
        self.wait_for_merge_or_schedule();
    }

    fn wait_for_merge_or_schedule(&mut self) {
        let Some(stats) = self.running_stats() else {
            return;
        };
        let snapshot = Arc::clone(&self.services.snapshot);

        snapshot.set_merge_stats_features(stats.as_ref());

        // Record a previous failure now; after processing, a successful merge
        // would overwrite it.
        let failure_code = snapshot.read_merge_failure_code();
        if !failure_code.is_ok() {
            stats.set_merge_failure_code(failure_code);
        }

        let raw = {
            let mut hooks = CleanupHooks {
                snapshot: snapshot.as_ref(),
                prefs: self.services.prefs.as_ref(),
                delegate: self.services.delegate.as_deref(),
                progress: &mut self.progress,
                cancel_failed: &mut self.cancel_failed,
            };
            snapshot.process_update_state(&mut hooks)
        };
        let state = decode_update_state(raw, "process_update_state");
        stats.set_state(state);

        match state {
            UpdateState::None => {
                info!("Can't find any snapshot to merge.");
                let code = if snapshot.cancel_update() {
                    ErrorCode::Success
                } else {
                    info!("Failed to cancel the update.");
                    ErrorCode::Error
                };
                self.action_complete(code);
            }

            UpdateState::Initiated => {
                error!("Previous update has not been completed, not cleaning up");
                self.action_complete(ErrorCode::Success);
            }

            UpdateState::Unverified => self.initiate_merge_and_wait(),

            UpdateState::Merging => {
                self.schedule(
                    CleanupStep::WaitForMerge,
                    self.config.wait_for_merge_interval,
                );
            }

            UpdateState::MergeNeedsReboot => {
                error!("Need reboot to finish merging.");
                self.action_complete(ErrorCode::Error);
            }

            UpdateState::MergeCompleted => {
                info!("Merge finished with state MergeCompleted.");
                let boot_control = self.services.boot_control.as_ref();
                let source_slot = boot_control.current_slot().other();
                if !boot_control.mark_slot_unbootable(source_slot) {
                    warn!(slot = %source_slot, "Failed to mark slot unbootable");
                }
                self.action_complete(ErrorCode::Success);
            }

            UpdateState::MergeFailed => {
                error!("Merge failed. Device may be corrupted.");
                stats.set_merge_failure_code(snapshot.read_merge_failure_code());
                self.action_complete(ErrorCode::DeviceCorrupted);
            }

            UpdateState::Cancelled => {
                // Snapshots are kept when the progress reset failed; try again
                // next time.
                let code = if self.cancel_failed {
                    ErrorCode::Error
                } else {
                    ErrorCode::Success
                };
                self.action_complete(code);
            }
        }
    }

    fn initiate_merge_and_wait(&mut self) {
        let Some(stats) = self.running_stats() else {
            return;
        };
        info!("Attempting to initiate merge.");

        if self
            .services
            .properties
            .get_bool(props::GSI_IMAGE_RUNNING, false)
        {
            warn!("Suspend the merge while a dynamic system update image is running.");
            self.action_complete(ErrorCode::Error);
            return;
        }

        let snapshot = Arc::clone(&self.services.snapshot);
        snapshot.update_cow_stats(stats.as_ref());

        let merge_start_ms = duration_ms(self.services.clock.now());
        stats.set_boot_complete_to_merge_start_time_ms(
            merge_start_ms.saturating_sub(stats.boot_complete_time_ms()),
        );
        stats.set_source_build_fingerprint(&snapshot.read_source_build_fingerprint());

        if let Err(e) = stats.write_state() {
            error!(
                error = %e,
                "Failed to write merge stats; record may be unreliable if merge is interrupted."
            );
        }

        if snapshot.initiate_merge() {
            self.schedule(CleanupStep::WaitForMerge, Duration::ZERO);
            return;
        }

        warn!("Initiating the merge failed.");
        let state = decode_update_state(snapshot.get_update_state().state, "get_update_state");
        stats.set_state(state);
        if state == UpdateState::Unverified {
            // The update was applied but never booted into, e.g. because the
            // updater restarted before the reboot. Nothing to do.
            warn!("Initiating the merge leaves the device in Unverified state.");
            self.action_complete(ErrorCode::Success);
            return;
        }

        // The state moved on concurrently (someone else may have started the
        // merge), so look at it again from a fresh task.
        warn!(state = %state, "Initiating the merge failed but the state advanced, waiting for merge again");
        self.schedule(CleanupStep::WaitForMerge, Duration::ZERO);
    }
}

impl Drop for MergeCleanupAction {
    fn drop(&mut self) {
        self.stop_internal();
    }
}

/// Decodes a reported update state, aborting on reserved values.
///
/// A reserved value means the snapshot manager's on-disk state is corrupt or
/// from an incompatible version. Guessing an outcome could delete snapshots
/// that are still needed, so this panics.
fn decode_update_state(raw: RawUpdateState, source: &str) -> UpdateState {
    match UpdateState::try_from(raw) {
        Ok(state) => state,
        Err(e) => {
            error!(raw = raw.0, source, "Snapshot manager returned a reserved update state");
            panic!("{source} returned {e}");
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
