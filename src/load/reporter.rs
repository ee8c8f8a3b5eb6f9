use crate::load::stats::LoadCounters;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Log a counter snapshot every `interval` until `shutdown` fires.
pub fn spawn(
    counters: Arc<LoadCounters>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = counters.snapshot();
                    log::info!(
                        "Status: {} insertions, {} inuse connections, {} fails",
                        snapshot.completed,
                        snapshot.in_flight,
                        snapshot.failed
                    );
                }
            }
        }
    })
}
