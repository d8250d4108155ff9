//! Core domain types for post-install merge cleanup.
//!
//! These types describe what the snapshot and boot-control services report and
//! what the cleanup action hands back to its sequencer, encoding the closed
//! enumerations of the update protocol in the type system.

pub mod report;
pub mod slot;
pub mod state;

// Re-export commonly used types at the module level
pub use report::{CowUsage, MergeFeatures, MergeStatsReport, MergeStatsResult};
pub use slot::{FeatureFlag, Slot};
pub use state::{
    CreateResult, ErrorCode, ExecutionContext, MergeFailureCode, RawUpdateState, UnknownUpdateState,
    UpdateState,
};
