use crate::load::admission::Admission;
use crate::load::statement::Statement;
use crate::load::task::{Outcome, OutcomeStatus, Task};
use crate::store::InsertStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Execute one task and hand its outcome, with the admission slot, to the collector.
///
/// Store failures are logged and reported, never retried.
pub async fn run_insert<S: InsertStore>(
    store: Arc<S>,
    statement: Arc<Statement>,
    task: Task,
    admission: Admission,
    outcomes: mpsc::Sender<Outcome>,
) {
    let status = match store.execute(&statement, &task.args).await {
        Ok(rows_affected) => OutcomeStatus::Inserted { rows_affected },
        Err(err) => {
            log::warn!("Row Number: {}, {}", task.seq, err);
            OutcomeStatus::Failed
        }
    };

    let outcome = Outcome {
        seq: task.seq,
        status,
        admission,
    };

    if let Err(err) = outcomes.send(outcome).await {
        // Only happens while the pipeline is being torn down; the slot is
        // released with the dropped outcome.
        log::debug!("outcome for row {} discarded: collector gone", err.0.seq);
    }
}
