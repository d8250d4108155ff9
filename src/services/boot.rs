//! Boot-slot control.

use crate::types::{FeatureFlag, Slot};

/// Slot state and feature flags of an A/B device.
pub trait BootControl: Send + Sync {
    /// Whether the device uses snapshot-backed (virtual) A/B partitions.
    fn virtual_ab_feature_flag(&self) -> FeatureFlag;

    fn virtual_ab_compression_feature_flag(&self) -> FeatureFlag;

    fn virtual_ab_userspace_snapshots_feature_flag(&self) -> FeatureFlag;

    fn virtual_ab_compression_xor_feature_flag(&self) -> FeatureFlag;

    /// The slot the device booted from.
    fn current_slot(&self) -> Slot;

    /// Whether the boot of `slot` has been verified.
    fn is_slot_marked_successful(&self, slot: Slot) -> bool;

    /// Prevents `slot` from being booted again. Returns false on failure.
    fn mark_slot_unbootable(&self, slot: Slot) -> bool;
}
