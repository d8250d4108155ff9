//! Continuations the cleanup action schedules.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A step of the cleanup state machine that runs from a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CleanupStep {
    /// Check whether the system finished booting.
    WaitBootCompleted,

    /// Check whether the current slot was marked successful.
    CheckSlotMarkedSuccessful,

    /// Mount metadata and start waiting for the merge.
    StartMerge,

    /// Advance the snapshot update state and act on it.
    WaitForMerge,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanupStep::WaitBootCompleted => "WaitBootCompleted",
            CleanupStep::CheckSlotMarkedSuccessful => "WaitMarkBootSuccessful",
            CleanupStep::StartMerge => "StartMerge",
            CleanupStep::WaitForMerge => "WaitForMerge",
        };
        f.write_str(name)
    }
}
