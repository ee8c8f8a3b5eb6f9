use crate::load::stats::LoadCounters;
use crate::load::task::Outcome;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Totals seen by the collector over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    pub outcomes: u64,
    pub failures: u64,
}

/// Single serialized consumer of worker outcomes.
///
/// For each outcome it records completion (and failure) in the counters and
/// only then releases the admission slot, so a new task can never be admitted
/// ahead of the accounting for the one it replaces. It returns once every
/// sender has been dropped and the channel is empty.
pub fn spawn(
    counters: Arc<LoadCounters>,
    mut outcomes: mpsc::Receiver<Outcome>,
) -> JoinHandle<CollectorSummary> {
    tokio::spawn(async move {
        let mut summary = CollectorSummary::default();

        while let Some(outcome) = outcomes.recv().await {
            let succeeded = outcome.succeeded();
            counters.record_completion(succeeded);

            summary.outcomes += 1;
            if !succeeded {
                summary.failures += 1;
            }
            log::trace!("row {} accounted ({:?})", outcome.seq, outcome.status);

            outcome.admission.release();
        }

        log::debug!(
            "collector drained: {} outcomes, {} failures",
            summary.outcomes,
            summary.failures
        );
        summary
    })
}
