//! The post-install merge cleanup action.
//!
//! After an update has been applied to the inactive slot of a virtual A/B
//! device, the updated partitions exist only as copy-on-write snapshots. Once
//! the device has booted into the new slot and verified it, the snapshots are
//! merged back into the base partitions. [`MergeCleanupAction`] drives that
//! merge to the end and reports how it went.
//!
//! # State Machine
//!
//! ```text
//! Start ─► WaitBootCompleted ─► WaitSlotVerified ─► CheckMergeDelay ─► StartMerge ─► WaitForMerge
//!              ▲      │              ▲      │                                          │    ▲
//!              └──────┘              └──────┘                                          └────┘
//!            (poll interval)       (poll interval)                               (Merging: poll interval)
//! ```
//!
//! Every wait is a task posted to a [`Scheduler`](crate::scheduler::Scheduler).
//! The action keeps at most one such task and acknowledges it when it fires.
//!
//! # Key Invariants
//!
//! 1. **Single task**: posting a task cancels any tracked task first.
//! 2. **Stopped means inert**: a task firing after suspension does nothing.
//! 3. **Restart from the top**: resuming re-derives the state from the
//!    services instead of continuing the interrupted wait.
//! 4. **Release once**: the metadata mount is dropped exactly once, when the
//!    action completes.
//! 5. **Sticky cancel failure**: once a cancellation was refused, a later
//!    `Cancelled` state completes with `Error`.
//! 6. **Reserved states abort**: an update state outside the known enumeration
//!    panics instead of being mapped to an outcome.

mod action;
mod hooks;
mod progress;
mod report;
mod reset;
mod step;


pub use action::{ActionState, CleanupServices, MergeCleanupAction};
pub use progress::MergeProgress;
pub use report::{build_merge_report, report_merge_stats};
pub use reset::reset_update_progress;
pub use step::CleanupStep;
