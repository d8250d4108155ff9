//! Finalizing and emitting the merge report.

use tracing::{info, warn};

use crate::config::CleanupConfig;
use crate::services::props;
use crate::services::{
    BootControl, MergeStatsRecorder, MetricsSink, SnapshotMergeReported, SystemProperties,
};
use crate::types::MergeStatsResult;

/// Builds the metrics event for a finished merge.
///
/// Compression, userspace-snapshot and XOR usage come from the report: after
/// the merge the update no longer exists, so only the recorder knows which
/// features it used. Availability comes from the device's feature flags.
pub fn build_merge_report(
    result: &MergeStatsResult,
    boot_control: &dyn BootControl,
    target_build_fingerprint: String,
) -> SnapshotMergeReported {
    let report = &result.report;
    SnapshotMergeReported {
        state: report.state,
        merge_time_ms: u64::try_from(result.merge_time.as_millis()).unwrap_or(u64::MAX),
        resume_count: report.resume_count,
        vab_retrofit: boot_control.virtual_ab_feature_flag().is_retrofit(),
        cow_file_size: report.cow.cow_file_size,
        vab_compression_enabled: boot_control
            .virtual_ab_compression_feature_flag()
            .is_enabled(),
        vab_compression_used: report.features.compression_enabled,
        total_cow_size_bytes: report.cow.total_cow_size_bytes,
        estimated_cow_size_bytes: report.cow.estimated_cow_size_bytes,
        boot_complete_time_ms: report.boot_complete_time_ms,
        boot_complete_to_merge_start_time_ms: report.boot_complete_to_merge_start_time_ms,
        merge_failure_code: report.merge_failure_code,
        source_build_fingerprint: report.source_build_fingerprint.clone(),
        target_build_fingerprint,
        userspace_snapshots_enabled: boot_control
            .virtual_ab_userspace_snapshots_feature_flag()
            .is_enabled(),
        userspace_snapshots_used: report.features.userspace_snapshots_used,
        xor_compression_enabled: boot_control
            .virtual_ab_compression_xor_feature_flag()
            .is_enabled(),
        xor_compression_used: report.features.xor_compression_used,
        iouring_used: report.features.iouring_used,
    }
}

/// Finishes `stats` and hands the report to `metrics` when appropriate.
///
/// The recorder is always finished. Emission is skipped in recovery, when
/// metrics are disabled, and for states in which no merge took place.
/// Returns the emitted event.
pub fn report_merge_stats(
    stats: &dyn MergeStatsRecorder,
    config: &CleanupConfig,
    boot_control: &dyn BootControl,
    properties: &dyn SystemProperties,
    metrics: &dyn MetricsSink,
) -> Option<SnapshotMergeReported> {
    let result = match stats.finish() {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Not reporting merge stats because finishing the recorder failed");
            return None;
        }
    };

    if config.context.is_recovery() {
        info!("Skip reporting merge stats in recovery.");
        return None;
    }
    if !config.report_metrics {
        info!("Skip reporting merge stats because metrics are disabled.");
        return None;
    }

    let state = result.report.state;
    if !state.is_reportable() {
        info!(state = %state, "Not reporting merge stats because of the update state");
        return None;
    }

    let target_build_fingerprint = properties.get_string(props::BUILD_FINGERPRINT, "");
    let event = build_merge_report(&result, boot_control, target_build_fingerprint);

    info!(
        "Reporting merge stats: {} in {}ms (resumed {} times), using {} bytes of COW image.",
        event.state, event.merge_time_ms, event.resume_count, event.cow_file_size
    );
    metrics.snapshot_merge_reported(&event);
    Some(event)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::sim::{MemoryProperties, MemoryStatsRecorder, RecordingMetrics, SimBootControl};
    use crate::test_utils::arb_merge_stats_report;
    use crate::types::{FeatureFlag, MergeStatsReport, UpdateState};
    use proptest::prelude::*;

    fn started_stats(state: UpdateState) -> (Arc<ManualClock>, MemoryStatsRecorder) {
        let clock = Arc::new(ManualClock::default());
        let stats = MemoryStatsRecorder::new(clock.clone());
        stats.start().unwrap();
        stats.set_state(state);
        (clock, stats)
    }

    proptest! {
        /// Every field of the finished report reaches the event unchanged.
        #[test]
        fn event_carries_the_report(report in arb_merge_stats_report(), ms in 0u64..1_000_000) {
            let boot_control = SimBootControl::new();
            let result = MergeStatsResult::new(report.clone(), Duration::from_millis(ms));

            let event = build_merge_report(&result, &boot_control, "target".to_string());

            prop_assert_eq!(event.state, report.state);
            prop_assert_eq!(event.merge_time_ms, ms);
            prop_assert_eq!(event.resume_count, report.resume_count);
            prop_assert_eq!(event.cow_file_size, report.cow.cow_file_size);
            prop_assert_eq!(event.total_cow_size_bytes, report.cow.total_cow_size_bytes);
            prop_assert_eq!(event.estimated_cow_size_bytes, report.cow.estimated_cow_size_bytes);
            prop_assert_eq!(event.vab_compression_used, report.features.compression_enabled);
            prop_assert_eq!(event.userspace_snapshots_used, report.features.userspace_snapshots_used);
            prop_assert_eq!(event.xor_compression_used, report.features.xor_compression_used);
            prop_assert_eq!(event.iouring_used, report.features.iouring_used);
            prop_assert_eq!(event.merge_failure_code, report.merge_failure_code);
            prop_assert_eq!(&event.source_build_fingerprint, &report.source_build_fingerprint);
            prop_assert_eq!(event.boot_complete_time_ms, report.boot_complete_time_ms);
            prop_assert_eq!(
                event.boot_complete_to_merge_start_time_ms,
                report.boot_complete_to_merge_start_time_ms
            );
        }
    }

    #[test]
    fn feature_availability_comes_from_boot_control() {
        let boot_control = SimBootControl::new();
        boot_control.set_virtual_ab(FeatureFlag::Retrofit);
        boot_control.set_compression(FeatureFlag::None);
        boot_control.set_userspace_snapshots(FeatureFlag::Launch);
        boot_control.set_xor_compression(FeatureFlag::Retrofit);
        let result = MergeStatsResult::new(MergeStatsReport::default(), Duration::ZERO);

        let event = build_merge_report(&result, &boot_control, String::new());

        assert!(event.vab_retrofit);
        assert!(!event.vab_compression_enabled);
        assert!(event.userspace_snapshots_enabled);
        assert!(event.xor_compression_enabled);
    }

    #[test]
    fn completed_merge_is_reported_with_target_fingerprint() {
        let (clock, stats) = started_stats(UpdateState::MergeCompleted);
        clock.advance(Duration::from_millis(750));
        let properties = MemoryProperties::new().with(props::BUILD_FINGERPRINT, "vendor/device:14");
        let metrics = RecordingMetrics::new();

        let event = report_merge_stats(
            &stats,
            &CleanupConfig::new(),
            &SimBootControl::new(),
            &properties,
            &metrics,
        );

        let event = event.unwrap();
        assert_eq!(event.merge_time_ms, 750);
        assert_eq!(event.target_build_fingerprint, "vendor/device:14");
        assert_eq!(metrics.events(), vec![event]);
    }

    #[test]
    fn states_without_a_merge_are_not_reported() {
        for state in [UpdateState::None, UpdateState::Initiated, UpdateState::Unverified] {
            let (_clock, stats) = started_stats(state);
            let metrics = RecordingMetrics::new();

            let event = report_merge_stats(
                &stats,
                &CleanupConfig::new(),
                &SimBootControl::new(),
                &MemoryProperties::new(),
                &metrics,
            );

            assert!(event.is_none(), "{state}");
            assert!(metrics.events().is_empty());
            assert_eq!(stats.finishes(), 1);
        }
    }

    #[test]
    fn recovery_finishes_without_reporting() {
        let (_clock, stats) = started_stats(UpdateState::MergeCompleted);
        let metrics = RecordingMetrics::new();

        let event = report_merge_stats(
            &stats,
            &CleanupConfig::recovery(),
            &SimBootControl::new(),
            &MemoryProperties::new(),
            &metrics,
        );

        assert!(event.is_none());
        assert!(!stats.is_started());
        assert!(metrics.events().is_empty());
    }

    #[test]
    fn unfinished_recorder_is_not_reported() {
        let stats = MemoryStatsRecorder::new(Arc::new(ManualClock::default()));
        let metrics = RecordingMetrics::new();

        let event = report_merge_stats(
            &stats,
            &CleanupConfig::new(),
            &SimBootControl::new(),
            &MemoryProperties::new(),
            &metrics,
        );

        assert!(event.is_none());
        assert!(metrics.events().is_empty());
    }
}
