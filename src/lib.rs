//! OTA Merge - drives the post-install snapshot merge of a virtual A/B update.
//!
//! This library provides the cleanup action state machine, the service
//! interfaces it drives, and the host pieces needed to run it: a timer queue,
//! durable merge statistics, a tokio worker and a simulated device.

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod persistence;
pub mod scheduler;
pub mod services;
pub mod sim;
pub mod types;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
