//! Update states and completion codes.
//!
//! The snapshot service reports its update state as a raw wire value. Only the
//! values listed in [`UpdateState`] are meaningful; anything else is reserved
//! and must never be interpreted as an ordinary outcome.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The update state tracked by the snapshot service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum UpdateState {
    /// No update or merge is in progress.
    None = 0,

    /// An update is being applied; the payload stage has not committed it.
    Initiated = 1,

    /// The update is applied but the new slot has not booted and verified yet.
    Unverified = 2,

    /// The merge is in progress, possibly driven by another process.
    Merging = 3,

    /// The merge needs a reboot before it can make further progress.
    MergeNeedsReboot = 4,

    /// The merge finished and the overlays were folded into the partitions.
    MergeCompleted = 5,

    /// The merge failed. The device may be in an inconsistent state.
    MergeFailed = 6,

    /// The update was cancelled and its snapshots were (or will be) removed.
    Cancelled = 7,
}

impl UpdateState {
    /// All states, in wire order.
    pub const ALL: [UpdateState; 8] = [
        UpdateState::None,
        UpdateState::Initiated,
        UpdateState::Unverified,
        UpdateState::Merging,
        UpdateState::MergeNeedsReboot,
        UpdateState::MergeCompleted,
        UpdateState::MergeFailed,
        UpdateState::Cancelled,
    ];

    /// Returns the state's name as it appears in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            UpdateState::None => "None",
            UpdateState::Initiated => "Initiated",
            UpdateState::Unverified => "Unverified",
            UpdateState::Merging => "Merging",
            UpdateState::MergeNeedsReboot => "MergeNeedsReboot",
            UpdateState::MergeCompleted => "MergeCompleted",
            UpdateState::MergeFailed => "MergeFailed",
            UpdateState::Cancelled => "Cancelled",
        }
    }

    /// Returns true if a merge report for this state is worth emitting.
    ///
    /// Reports for states where no merge ever started carry no information.
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            UpdateState::None | UpdateState::Initiated | UpdateState::Unverified
        )
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An update state exactly as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUpdateState(pub i32);

impl From<UpdateState> for RawUpdateState {
    fn from(state: UpdateState) -> Self {
        RawUpdateState(state as i32)
    }
}

impl fmt::Display for RawUpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match UpdateState::try_from(*self) {
            Ok(state) => write!(f, "{}", state),
            Err(_) => write!(f, "<reserved {}>", self.0),
        }
    }
}

/// A raw update state outside the known enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reserved update state value {0}")]
pub struct UnknownUpdateState(pub i32);

impl TryFrom<RawUpdateState> for UpdateState {
    type Error = UnknownUpdateState;

    fn try_from(raw: RawUpdateState) -> Result<Self, Self::Error> {
        UpdateState::ALL
            .into_iter()
            .find(|state| *state as i32 == raw.0)
            .ok_or(UnknownUpdateState(raw.0))
    }
}

/// Reason code recorded by the snapshot service when a merge fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeFailureCode(pub i32);

impl MergeFailureCode {
    /// No failure recorded.
    pub const OK: MergeFailureCode = MergeFailureCode(0);

    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }
}

impl fmt::Display for MergeFailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of asking the snapshot service to recreate overlay devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateResult {
    /// Devices for an unfinished merge were created.
    Created,
    /// There was nothing to create.
    NotCreated,
    Error,
}

/// The code the cleanup action completes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Success,

    /// A failure that leaves the device intact (reboot pending, mount failure,
    /// scheduling failure, rejected cancellation, ...).
    Error,

    /// The merge failed; on-disk data may be inconsistent.
    DeviceCorrupted,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "success"),
            ErrorCode::Error => write!(f, "error"),
            ErrorCode::DeviceCorrupted => write!(f, "device corrupted"),
        }
    }
}

/// The environment the action runs in.
///
/// Recovery boots skip the boot/slot gates, recreate overlay devices, tolerate
/// an unmountable metadata partition and never emit metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    #[default]
    Normal,
    Recovery,
}

impl ExecutionContext {
    pub fn is_recovery(&self) -> bool {
        matches!(self, ExecutionContext::Recovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_raw_update_state;
    use proptest::prelude::*;

    proptest! {
        /// Exactly the values 0..=7 decode, and decoding is the inverse of
        /// encoding.
        #[test]
        fn decode_accepts_only_known_values(raw in arb_raw_update_state()) {
            match UpdateState::try_from(raw) {
                Ok(state) => prop_assert_eq!(RawUpdateState::from(state), raw),
                Err(e) => {
                    prop_assert!(!(0..=7).contains(&raw.0));
                    prop_assert_eq!(e, UnknownUpdateState(raw.0));
                }
            }
        }
    }

    #[test]
    fn known_values_decode_to_their_state() {
        for state in UpdateState::ALL {
            let raw = RawUpdateState::from(state);
            assert_eq!(UpdateState::try_from(raw), Ok(state));
        }
    }

    #[test]
    fn reserved_values_are_rejected() {
        assert_eq!(
            UpdateState::try_from(RawUpdateState(8)),
            Err(UnknownUpdateState(8))
        );
        assert_eq!(
            UpdateState::try_from(RawUpdateState(-1)),
            Err(UnknownUpdateState(-1))
        );
    }

    #[test]
    fn raw_state_display_marks_reserved_values() {
        assert_eq!(RawUpdateState(5).to_string(), "MergeCompleted");
        assert_eq!(RawUpdateState(42).to_string(), "<reserved 42>");
    }

    #[test]
    fn only_merge_states_are_reportable() {
        assert!(!UpdateState::None.is_reportable());
        assert!(!UpdateState::Initiated.is_reportable());
        assert!(!UpdateState::Unverified.is_reportable());
        assert!(UpdateState::Merging.is_reportable());
        assert!(UpdateState::MergeCompleted.is_reportable());
        assert!(UpdateState::MergeFailed.is_reportable());
        assert!(UpdateState::Cancelled.is_reportable());
    }

    #[test]
    fn update_state_serializes_snake_case() {
        let json = serde_json::to_string(&UpdateState::MergeNeedsReboot).unwrap();
        assert_eq!(json, "\"merge_needs_reboot\"");
    }
}
