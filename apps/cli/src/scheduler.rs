use std::time::Duration;

use ingest::CycleOutcome;
use meter_app::AppState;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

/// Runs a scan cycle every `every` on the blocking pool. A tick that lands
/// while a cycle is still running is skipped.
pub fn spawn(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let scan = state.services.scan.clone();
            match tokio::task::spawn_blocking(move || scan.run()).await {
                Ok(Ok(CycleOutcome::AlreadyRunning)) => {
                    info!("scheduled scan skipped, previous cycle still running");
                }
                Ok(Ok(CycleOutcome::Completed(_))) => {}
                Ok(Err(err)) => warn!(error = %err, "scheduled scan failed"),
                Err(err) => warn!(error = %err, "scheduled scan task panicked"),
            }
        }
    })
}
