use std::process::ExitCode;
use std::sync::Arc;

use ota_merge::clock::{Clock, MonotonicClock};
use ota_merge::config::CleanupConfig;
use ota_merge::persistence::FileMergeStatsRecorder;
use ota_merge::services::{BootControl, MergeStatsRecorder, TracingMetricsSink};
use ota_merge::sim::{MemoryStatsRecorder, SimConfig, SimDevice};
use ota_merge::types::ErrorCode;
use ota_merge::worker::MergeWorker;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ota_merge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CleanupConfig::from_env();
    let sim = SimConfig::from_env();
    info!(?config, ?sim, "Starting merge cleanup on a simulated device");

    let clock: Arc<dyn Clock> = match MonotonicClock::since_boot() {
        Ok(clock) => Arc::new(clock),
        Err(e) => {
            warn!(error = %e, "Cannot read uptime, measuring time from process start");
            Arc::new(MonotonicClock::new())
        }
    };
    let stats: Arc<dyn MergeStatsRecorder> = match &sim.stats_file {
        Some(path) => Arc::new(FileMergeStatsRecorder::new(path, clock.clone())),
        None => Arc::new(MemoryStatsRecorder::new(clock.clone())),
    };
    let device = SimDevice::new(Some(stats));
    device.configure(&sim);

    // The simulated system finishes booting, then verifies the new slot.
    let properties = device.properties.clone();
    let boot_control = device.boot_control.clone();
    let (boot_delay, verify_delay) = (sim.boot_delay, sim.verify_delay);
    tokio::spawn(async move {
        tokio::time::sleep(boot_delay).await;
        properties.set(ota_merge::services::props::BOOT_COMPLETED, "1");
        info!("Simulated boot completed");

        tokio::time::sleep(verify_delay).await;
        let slot = boot_control.current_slot();
        boot_control.mark_successful(slot);
        info!(slot = %slot, "Simulated slot verified");
    });

    let services = device.services(clock, Arc::new(TracingMetricsSink));
    let handle = MergeWorker::new(config, services).spawn();

    let shutdown = handle.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping merge cleanup");
            shutdown.cancel();
        }
    });

    match handle.wait().await {
        Ok(Some(ErrorCode::Success)) => {
            info!("Merge cleanup succeeded");
            ExitCode::SUCCESS
        }
        Ok(Some(code)) => {
            error!(code = %code, "Merge cleanup failed");
            ExitCode::FAILURE
        }
        Ok(None) => {
            info!("Merge cleanup stopped before completion");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Merge worker failed");
            ExitCode::from(2)
        }
    }
}
