//! A simulated virtual A/B device.
//!
//! Every service trait has an in-memory implementation here. The binary runs
//! the cleanup worker against a [`SimDevice`], and the tests use the same
//! pieces to script device behavior.
//!
//! # Module Structure
//!
//! - [`store`]: preferences and system properties
//! - [`boot`]: slot state and feature flags
//! - [`snapshot`]: the update record and merge progress
//! - [`stats`]: an in-memory stats recorder
//! - [`observers`]: recording processor, progress delegate and metrics sink

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cleanup::CleanupServices;
use crate::clock::Clock;
use crate::services::props;
use crate::services::{BootControl, MergeStatsRecorder, MetricsSink};
use crate::types::UpdateState;

pub mod boot;
pub mod observers;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use boot::SimBootControl;
pub use observers::{RecordingDelegate, RecordingMetrics, RecordingProcessor};
pub use snapshot::{SimMountedVolume, SimSnapshotManager};
pub use stats::MemoryStatsRecorder;
pub use store::{MemoryPreferences, MemoryProperties};

/// Default time until the simulated system reports boot completion.
const DEFAULT_BOOT_DELAY_SECS: u64 = 3;

/// Default time from boot completion until the slot is verified.
const DEFAULT_VERIFY_DELAY_SECS: u64 = 2;

/// Default merge progress per poll, in percent.
const DEFAULT_MERGE_STEP_PERCENT: f64 = 20.0;

/// Configuration of the simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Time until `sys.boot_completed` is set.
    pub boot_delay: Duration,

    /// Time from boot completion until the current slot is marked successful.
    pub verify_delay: Duration,

    /// Merge progress per poll, in percent.
    pub merge_step_percent: f64,

    /// Value of the merge delay property, in seconds.
    pub merge_delay_secs: i64,

    /// Where merge stats are persisted. In memory when unset.
    pub stats_file: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            boot_delay: Duration::from_secs(DEFAULT_BOOT_DELAY_SECS),
            verify_delay: Duration::from_secs(DEFAULT_VERIFY_DELAY_SECS),
            merge_step_percent: DEFAULT_MERGE_STEP_PERCENT,
            merge_delay_secs: 0,
            stats_file: None,
        }
    }
}

impl SimConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Reads `OTA_MERGE_SIM_BOOT_DELAY_SECS`, `OTA_MERGE_SIM_VERIFY_DELAY_SECS`,
    /// `OTA_MERGE_SIM_MERGE_STEP`, `OTA_MERGE_SIM_MERGE_DELAY_SECS` and
    /// `OTA_MERGE_SIM_STATS_FILE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        SimConfig {
            boot_delay: env_parse("OTA_MERGE_SIM_BOOT_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.boot_delay),
            verify_delay: env_parse("OTA_MERGE_SIM_VERIFY_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.verify_delay),
            merge_step_percent: env_parse("OTA_MERGE_SIM_MERGE_STEP")
                .filter(|step: &f64| *step > 0.0)
                .unwrap_or(defaults.merge_step_percent),
            merge_delay_secs: env_parse("OTA_MERGE_SIM_MERGE_DELAY_SECS")
                .unwrap_or(defaults.merge_delay_secs),
            stats_file: std::env::var_os("OTA_MERGE_SIM_STATS_FILE").map(PathBuf::from),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// A device with an applied, not yet merged update.
pub struct SimDevice {
    pub properties: Arc<MemoryProperties>,
    pub boot_control: Arc<SimBootControl>,
    pub snapshot: Arc<SimSnapshotManager>,
    pub prefs: Arc<MemoryPreferences>,
    pub processor: Arc<RecordingProcessor>,
    pub delegate: Arc<RecordingDelegate>,
}

impl SimDevice {
    /// Creates a freshly rebooted device whose update awaits verification.
    pub fn new(stats: Option<Arc<dyn MergeStatsRecorder>>) -> Self {
        let snapshot = SimSnapshotManager::new(stats);
        snapshot.set_update_state(UpdateState::Unverified);

        SimDevice {
            properties: Arc::new(MemoryProperties::new()),
            boot_control: Arc::new(SimBootControl::new()),
            snapshot: Arc::new(snapshot),
            prefs: Arc::new(MemoryPreferences::new()),
            processor: Arc::new(RecordingProcessor::new()),
            delegate: Arc::new(RecordingDelegate::new()),
        }
    }

    /// Applies `config` to the device's update and properties.
    pub fn configure(&self, config: &SimConfig) {
        self.snapshot.set_merge_step(config.merge_step_percent);
        self.properties.set(
            props::MERGE_DELAY_SECONDS,
            config.merge_delay_secs.to_string(),
        );
    }

    /// Sets `sys.boot_completed`.
    pub fn complete_boot(&self) {
        self.properties.set(props::BOOT_COMPLETED, "1");
    }

    /// Marks the current slot as successfully booted.
    pub fn verify_slot(&self) {
        self.boot_control
            .mark_successful(self.boot_control.current_slot());
    }

    /// Completes boot and verifies the slot in one go.
    pub fn boot_and_verify(&self) {
        self.complete_boot();
        self.verify_slot();
    }

    /// Bundles the device's services for a cleanup action.
    pub fn services(&self, clock: Arc<dyn Clock>, metrics: Arc<dyn MetricsSink>) -> CleanupServices {
        CleanupServices {
            snapshot: self.snapshot.clone(),
            boot_control: self.boot_control.clone(),
            prefs: self.prefs.clone(),
            properties: self.properties.clone(),
            processor: self.processor.clone(),
            metrics,
            clock,
            delegate: Some(self.delegate.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{SnapshotManager, SystemProperties};
    use crate::types::RawUpdateState;

    #[test]
    fn new_device_has_an_unverified_update() {
        let device = SimDevice::new(None);

        assert_eq!(
            device.snapshot.get_update_state().state,
            RawUpdateState::from(UpdateState::Unverified)
        );
        assert!(!device.properties.get_bool(props::BOOT_COMPLETED, false));
    }

    #[test]
    fn configure_sets_merge_delay_property() {
        let device = SimDevice::new(None);
        let config = SimConfig {
            merge_delay_secs: 30,
            ..SimConfig::default()
        };

        device.configure(&config);

        assert_eq!(device.properties.get_i64(props::MERGE_DELAY_SECONDS, 0), 30);
    }
}
