//! Simulated boot control.

use std::sync::{Mutex, MutexGuard};

use crate::services::BootControl;
use crate::types::{FeatureFlag, Slot};

#[derive(Debug)]
struct BootState {
    virtual_ab: FeatureFlag,
    compression: FeatureFlag,
    userspace_snapshots: FeatureFlag,
    xor_compression: FeatureFlag,
    current_slot: Slot,
    successful: [bool; 2],
    unbootable: Vec<Slot>,
    mark_unbootable_fails: bool,
    slot_queries: usize,
}

/// A [`BootControl`] for a virtual A/B device booted from slot A.
///
/// The current slot starts out unverified; call
/// [`SimBootControl::mark_successful`] to verify it.
#[derive(Debug)]
pub struct SimBootControl {
    state: Mutex<BootState>,
}

impl Default for SimBootControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBootControl {
    pub fn new() -> Self {
        SimBootControl {
            state: Mutex::new(BootState {
                virtual_ab: FeatureFlag::Launch,
                compression: FeatureFlag::Launch,
                userspace_snapshots: FeatureFlag::None,
                xor_compression: FeatureFlag::None,
                current_slot: Slot::A,
                successful: [false; 2],
                unbootable: Vec::new(),
                mark_unbootable_fails: false,
                slot_queries: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BootState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_virtual_ab(&self, flag: FeatureFlag) {
        self.state().virtual_ab = flag;
    }

    pub fn set_compression(&self, flag: FeatureFlag) {
        self.state().compression = flag;
    }

    pub fn set_userspace_snapshots(&self, flag: FeatureFlag) {
        self.state().userspace_snapshots = flag;
    }

    pub fn set_xor_compression(&self, flag: FeatureFlag) {
        self.state().xor_compression = flag;
    }

    pub fn set_current_slot(&self, slot: Slot) {
        self.state().current_slot = slot;
    }

    /// Marks the boot of `slot` as verified.
    pub fn mark_successful(&self, slot: Slot) {
        self.state().successful[slot.index() as usize] = true;
    }

    pub fn set_mark_unbootable_fails(&self, fails: bool) {
        self.state().mark_unbootable_fails = fails;
    }

    /// Slots successfully marked unbootable, in call order.
    pub fn unbootable_slots(&self) -> Vec<Slot> {
        self.state().unbootable.clone()
    }

    /// Number of slot verification queries so far.
    pub fn slot_queries(&self) -> usize {
        self.state().slot_queries
    }
}

impl BootControl for SimBootControl {
    fn virtual_ab_feature_flag(&self) -> FeatureFlag {
        self.state().virtual_ab
    }

    fn virtual_ab_compression_feature_flag(&self) -> FeatureFlag {
        self.state().compression
    }

    fn virtual_ab_userspace_snapshots_feature_flag(&self) -> FeatureFlag {
        self.state().userspace_snapshots
    }

    fn virtual_ab_compression_xor_feature_flag(&self) -> FeatureFlag {
        self.state().xor_compression
    }

    fn current_slot(&self) -> Slot {
        self.state().current_slot
    }

    fn is_slot_marked_successful(&self, slot: Slot) -> bool {
        let mut state = self.state();
        state.slot_queries += 1;
        state.successful[slot.index() as usize]
    }

    fn mark_slot_unbootable(&self, slot: Slot) -> bool {
        let mut state = self.state();
        if state.mark_unbootable_fails {
            return false;
        }
        state.unbootable.push(slot);
        true
    }
}
