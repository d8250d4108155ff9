//! The merge report metrics event.

use serde::Serialize;
use tracing::{info, warn};

use crate::types::{MergeFailureCode, UpdateState};

/// The structured event emitted once per finished merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotMergeReported {
    pub state: UpdateState,
    pub merge_time_ms: u64,
    pub resume_count: u32,
    pub vab_retrofit: bool,
    pub cow_file_size: u64,
    pub vab_compression_enabled: bool,
    pub vab_compression_used: bool,
    pub total_cow_size_bytes: u64,
    pub estimated_cow_size_bytes: u64,
    pub boot_complete_time_ms: u64,
    pub boot_complete_to_merge_start_time_ms: u64,
    pub merge_failure_code: MergeFailureCode,
    pub source_build_fingerprint: String,
    pub target_build_fingerprint: String,
    pub userspace_snapshots_enabled: bool,
    pub userspace_snapshots_used: bool,
    pub xor_compression_enabled: bool,
    pub xor_compression_used: bool,
    pub iouring_used: bool,
}

/// Destination of merge report events.
pub trait MetricsSink: Send + Sync {
    fn snapshot_merge_reported(&self, event: &SnapshotMergeReported);
}

/// Emits merge reports as JSON on the `ota_merge::metrics` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn snapshot_merge_reported(&self, event: &SnapshotMergeReported) {
        match serde_json::to_string(event) {
            Ok(json) => info!(target: "ota_merge::metrics", event = %json, "snapshot_merge_reported"),
            Err(e) => warn!(error = %e, "Failed to encode merge report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_wire_field_names() {
        let event = SnapshotMergeReported {
            state: UpdateState::MergeCompleted,
            merge_time_ms: 1200,
            resume_count: 1,
            vab_retrofit: false,
            cow_file_size: 4096,
            vab_compression_enabled: true,
            vab_compression_used: true,
            total_cow_size_bytes: 8192,
            estimated_cow_size_bytes: 8000,
            boot_complete_time_ms: 30_000,
            boot_complete_to_merge_start_time_ms: 500,
            merge_failure_code: MergeFailureCode::OK,
            source_build_fingerprint: "vendor/device:13/A1/1:user".to_string(),
            target_build_fingerprint: "vendor/device:14/B2/2:user".to_string(),
            userspace_snapshots_enabled: true,
            userspace_snapshots_used: false,
            xor_compression_enabled: false,
            xor_compression_used: false,
            iouring_used: false,
        };

        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["state"], "merge_completed");
        assert_eq!(value["merge_time_ms"], 1200);
        assert_eq!(value["merge_failure_code"], 0);
        assert_eq!(value["target_build_fingerprint"], "vendor/device:14/B2/2:user");
    }
}
