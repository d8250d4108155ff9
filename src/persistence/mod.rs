//! Durable storage for merge statistics.
//!
//! A merge can be interrupted by a reboot at any point, so the statistics of
//! a running merge live in a file next to the snapshot metadata. The next
//! boot resumes from that file instead of starting a fresh record.
//!
//! # File Layout
//!
//! ```text
//! <metadata_dir>/
//!   merge_stats.json       # accumulated statistics of the running merge
//!   merge_stats.json.tmp   # only present while a write is in flight
//! ```
//!
//! # Crash Safety
//!
//! - Writes go to a temp file that is fsynced and renamed over the real one
//! - The parent directory is fsynced after every rename and removal
//! - A missing file means no merge is being recorded

pub mod fsync;
pub mod stats;

pub use fsync::{fsync_dir, fsync_file, fsync_parent};
pub use stats::{
    FileMergeStatsRecorder, PersistedMergeStats, SCHEMA_VERSION, load_stats, remove_stats,
    save_stats_atomic, try_load_stats,
};
