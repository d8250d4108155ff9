//! Configuration of the cleanup action.
//!
//! # Polling Strategy
//!
//! The action never blocks while waiting for a condition. It re-checks on a
//! fixed interval instead:
//!
//! - **Boot completed**: every 2 seconds until `sys.boot_completed` is set
//! - **Slot marked successful**: every 2 seconds until the boot is verified
//! - **Merge progress**: every 2 seconds while the merge is running
//!
//! There is no retry limit. The host suspends the action when it should stop
//! waiting.
//!
//! # Environment
//!
//! [`CleanupConfig::from_env`] reads the intervals (whole seconds) from
//! `OTA_MERGE_BOOT_POLL_SECS`, `OTA_MERGE_SLOT_POLL_SECS` and
//! `OTA_MERGE_MERGE_POLL_SECS`. `OTA_MERGE_RECOVERY=1` selects the recovery
//! context and `OTA_MERGE_DISABLE_STATS=1` turns off metric emission. Missing
//! or unparsable values fall back to the defaults.

use std::time::Duration;

use crate::types::ExecutionContext;

/// Default interval between boot-completed checks (2 seconds).
const DEFAULT_BOOT_COMPLETED_INTERVAL_SECS: u64 = 2;

/// Default interval between slot-marked-successful checks (2 seconds).
const DEFAULT_SLOT_MARKED_SUCCESSFUL_INTERVAL_SECS: u64 = 2;

/// Default interval between merge state checks (2 seconds).
const DEFAULT_WAIT_FOR_MERGE_INTERVAL_SECS: u64 = 2;

/// Upper bound for the operator-configured merge delay (10 minutes).
pub const MAX_MERGE_DELAY_SECS: u64 = 600;

/// Configuration for a cleanup action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Interval between checks of the boot-completed property.
    pub boot_completed_interval: Duration,

    /// Interval between checks of the current slot's verification.
    pub slot_marked_successful_interval: Duration,

    /// Interval between merge state checks while merging.
    pub wait_for_merge_interval: Duration,

    /// The merge delay property is clamped to `[0, max_merge_delay]`.
    pub max_merge_delay: Duration,

    /// Normal boot or recovery.
    pub context: ExecutionContext,

    /// Whether finished merge reports are handed to the metrics sink.
    ///
    /// Reports are still finalized when this is false.
    pub report_metrics: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        CleanupConfig {
            boot_completed_interval: Duration::from_secs(DEFAULT_BOOT_COMPLETED_INTERVAL_SECS),
            slot_marked_successful_interval: Duration::from_secs(
                DEFAULT_SLOT_MARKED_SUCCESSFUL_INTERVAL_SECS,
            ),
            wait_for_merge_interval: Duration::from_secs(DEFAULT_WAIT_FOR_MERGE_INTERVAL_SECS),
            max_merge_delay: Duration::from_secs(MAX_MERGE_DELAY_SECS),
            context: ExecutionContext::Normal,
            report_metrics: true,
        }
    }

    /// Creates a configuration for a recovery boot.
    pub fn recovery() -> Self {
        Self::new().with_context(ExecutionContext::Recovery)
    }

    /// Creates a configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::new();
        CleanupConfig {
            boot_completed_interval: env_secs("OTA_MERGE_BOOT_POLL_SECS")
                .unwrap_or(defaults.boot_completed_interval),
            slot_marked_successful_interval: env_secs("OTA_MERGE_SLOT_POLL_SECS")
                .unwrap_or(defaults.slot_marked_successful_interval),
            wait_for_merge_interval: env_secs("OTA_MERGE_MERGE_POLL_SECS")
                .unwrap_or(defaults.wait_for_merge_interval),
            context: if env_flag("OTA_MERGE_RECOVERY") {
                ExecutionContext::Recovery
            } else {
                ExecutionContext::Normal
            },
            report_metrics: !env_flag("OTA_MERGE_DISABLE_STATS"),
            ..defaults
        }
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_report_metrics(mut self, report: bool) -> Self {
        self.report_metrics = report;
        self
    }

    /// Sets all three polling intervals to `interval`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.boot_completed_interval = interval;
        self.slot_marked_successful_interval = interval;
        self.wait_for_merge_interval = interval;
        self
    }

    /// Clamps a merge delay property value to the configured bounds.
    ///
    /// Negative values mean no delay.
    pub fn clamp_merge_delay(&self, seconds: i64) -> Duration {
        let max = self.max_merge_delay.as_secs();
        let secs = u64::try_from(seconds).unwrap_or(0).min(max);
        Duration::from_secs(secs)
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = CleanupConfig::new();

        assert_eq!(config.boot_completed_interval, Duration::from_secs(2));
        assert_eq!(config.slot_marked_successful_interval, Duration::from_secs(2));
        assert_eq!(config.wait_for_merge_interval, Duration::from_secs(2));
        assert_eq!(config.max_merge_delay, Duration::from_secs(600));
        assert_eq!(config.context, ExecutionContext::Normal);
        assert!(config.report_metrics);
    }

    #[test]
    fn recovery_config_selects_recovery_context() {
        let config = CleanupConfig::recovery();
        assert!(config.context.is_recovery());
    }

    #[test]
    fn clamp_merge_delay_bounds() {
        let config = CleanupConfig::new();

        assert_eq!(config.clamp_merge_delay(-5), Duration::ZERO);
        assert_eq!(config.clamp_merge_delay(0), Duration::ZERO);
        assert_eq!(config.clamp_merge_delay(90), Duration::from_secs(90));
        assert_eq!(config.clamp_merge_delay(600), Duration::from_secs(600));
        assert_eq!(config.clamp_merge_delay(601), Duration::from_secs(600));
        assert_eq!(config.clamp_merge_delay(i64::MAX), Duration::from_secs(600));
    }

    #[test]
    fn with_poll_interval_sets_every_interval() {
        let config = CleanupConfig::new().with_poll_interval(Duration::from_millis(50));

        assert_eq!(config.boot_completed_interval, Duration::from_millis(50));
        assert_eq!(config.slot_marked_successful_interval, Duration::from_millis(50));
        assert_eq!(config.wait_for_merge_interval, Duration::from_millis(50));
    }

    proptest! {
        #[test]
        fn clamped_delay_never_exceeds_max(seconds in any::<i64>()) {
            let config = CleanupConfig::new();
            let delay = config.clamp_merge_delay(seconds);

            prop_assert!(delay <= config.max_merge_delay);
            if (0..=600).contains(&seconds) {
                prop_assert_eq!(delay.as_secs() as i64, seconds);
            }
        }
    }
}
