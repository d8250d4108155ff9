//! Shared test utilities and arbitrary generators for property-based testing.

use crate::types::{
    CowUsage, MergeFailureCode, MergeFeatures, MergeStatsReport, RawUpdateState, UpdateState,
};
use proptest::prelude::*;

pub fn arb_update_state() -> impl Strategy<Value = UpdateState> {
    prop::sample::select(UpdateState::ALL.to_vec())
}

/// Raw states, known and reserved alike.
pub fn arb_raw_update_state() -> impl Strategy<Value = RawUpdateState> {
    prop_oneof![
        arb_update_state().prop_map(RawUpdateState::from),
        any::<i32>().prop_map(RawUpdateState),
    ]
}

pub fn arb_merge_failure_code() -> impl Strategy<Value = MergeFailureCode> {
    prop_oneof![Just(MergeFailureCode::OK), (1i32..64).prop_map(MergeFailureCode)]
}

pub fn arb_cow_usage() -> impl Strategy<Value = CowUsage> {
    (any::<u32>(), any::<u32>(), any::<u32>()).prop_map(|(used, total, estimated)| CowUsage {
        cow_file_size: u64::from(used),
        total_cow_size_bytes: u64::from(total),
        estimated_cow_size_bytes: u64::from(estimated),
    })
}

pub fn arb_merge_features() -> impl Strategy<Value = MergeFeatures> {
    any::<[bool; 4]>().prop_map(|[compression, userspace, xor, iouring]| MergeFeatures {
        compression_enabled: compression,
        userspace_snapshots_used: userspace,
        xor_compression_used: xor,
        iouring_used: iouring,
    })
}

pub fn arb_fingerprint() -> impl Strategy<Value = String> {
    "[a-z]{1,8}/[a-z]{1,8}:[0-9]{2}/[A-Z0-9]{2,6}:user".prop_map(String::from)
}

pub fn arb_merge_stats_report() -> impl Strategy<Value = MergeStatsReport> {
    (
        arb_update_state(),
        0u32..10,
        arb_cow_usage(),
        arb_merge_features(),
        arb_merge_failure_code(),
        arb_fingerprint(),
        0u64..10_000_000,
        0u64..10_000_000,
    )
        .prop_map(
            |(state, resume_count, cow, features, code, fingerprint, boot_ms, start_ms)| {
                MergeStatsReport {
                    state,
                    resume_count,
                    cow,
                    features,
                    merge_failure_code: code,
                    source_build_fingerprint: fingerprint,
                    boot_complete_time_ms: boot_ms,
                    boot_complete_to_merge_start_time_ms: start_ms,
                }
            },
        )
}
