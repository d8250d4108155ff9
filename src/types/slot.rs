//! A/B slots and device feature flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two alternating partition sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// Returns the slot that is not `self`.
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    /// Returns the slot's numeric index (A = 0, B = 1).
    pub fn index(self) -> u32 {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::A => write!(f, "_a"),
            Slot::B => write!(f, "_b"),
        }
    }
}

/// How a device feature is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    /// Not available on this device.
    #[default]
    None,
    /// Added to a device that did not launch with it.
    Retrofit,
    /// Available since the device launched.
    Launch,
}

impl FeatureFlag {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FeatureFlag::None)
    }

    pub fn is_retrofit(&self) -> bool {
        matches!(self, FeatureFlag::Retrofit)
    }
}
