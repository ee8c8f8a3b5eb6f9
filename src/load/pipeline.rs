//! Orchestration of a single load run.
//!
//! The producer side is sequential: acquire an admission slot, pull the next
//! record, dispatch a worker. Workers run concurrently and report outcomes to
//! the collector out of order. Shutdown is a barrier: join every worker, close
//! the outcome channel, then wait for the collector to drain it.

use crate::config::{LoaderConfig, MalformedPolicy};
use crate::error::LoaderError;
use crate::load::admission::AdmissionController;
use crate::load::source::{Record, RecordSource, SourceError};
use crate::load::statement::{Statement, StatementBuilder};
use crate::load::stats::{LoadCounters, LoadReport};
use crate::load::task::Task;
use crate::load::{collector, reporter, worker};
use crate::store::InsertStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

pub struct Pipeline<S: InsertStore> {
    store: Arc<S>,
    table: String,
    builder: StatementBuilder,
    max_concurrency: usize,
    malformed_policy: MalformedPolicy,
    status_interval: Duration,
    counters: Arc<LoadCounters>,
}

impl<S: InsertStore> Pipeline<S> {
    pub fn new(store: Arc<S>, config: &LoaderConfig) -> Self {
        let builder = StatementBuilder::new(store.dialect(), config.table_name.clone())
            .upsert(config.enable_upsert)
            .conflict_columns(config.conflict_columns.clone());

        if config.enable_upsert {
            log::warn!(
                "upsert enabled: existing rows with the same key will be overwritten; \
                 concurrent upserts may contend on locks or deadlock"
            );
        }

        Self {
            store,
            table: config.table_name.clone(),
            builder,
            max_concurrency: config.max_concurrency.max(1),
            malformed_policy: config.malformed_policy,
            status_interval: config.status_interval,
            counters: Arc::new(LoadCounters::new()),
        }
    }

    /// Live counters, for observers outside the pipeline.
    pub fn counters(&self) -> Arc<LoadCounters> {
        self.counters.clone()
    }

    /// Load every data record from `source`.
    ///
    /// Returns the final report once all dispatched insertions are accounted
    /// for. A fatal error returns immediately; in-flight workers are aborted.
    pub async fn run(&self, mut source: RecordSource) -> Result<LoadReport, LoaderError> {
        let start = Instant::now();

        let shutdown = CancellationToken::new();
        let _stop_reporter = shutdown.clone().drop_guard();
        reporter::spawn(self.counters.clone(), self.status_interval, shutdown);

        let Some(statement) = self.prepare(&mut source).await? else {
            log::warn!("input is empty, nothing to load");
            return Ok(LoadReport::from_snapshot(
                self.counters.snapshot(),
                start.elapsed(),
            ));
        };
        let statement = Arc::new(statement);

        let admission = AdmissionController::new(self.max_concurrency);
        let (outcome_tx, outcome_rx) = mpsc::channel(self.max_concurrency);
        let collector = collector::spawn(self.counters.clone(), outcome_rx);
        let mut workers = JoinSet::new();
        let mut seq: u64 = 0;

        loop {
            let slot = admission.acquire().await?;
            let Some(record) = self.next_data_record(&mut source).await? else {
                slot.release();
                break;
            };

            seq += 1;
            let task = Task::new(seq, record.fields);
            self.counters.record_dispatch();
            workers.spawn(worker::run_insert(
                self.store.clone(),
                statement.clone(),
                task,
                slot,
                outcome_tx.clone(),
            ));

            while let Some(joined) = workers.try_join_next() {
                check_worker(joined)?;
            }
        }

        log::debug!("input exhausted after {} rows, joining workers", seq);
        while let Some(joined) = workers.join_next().await {
            check_worker(joined)?;
        }

        drop(outcome_tx);
        let summary = collector
            .await
            .map_err(|err| LoaderError::CollectorFailed(err.to_string()))?;

        if summary.outcomes != seq {
            return Err(LoaderError::CollectorFailed(format!(
                "{} tasks dispatched but {} outcomes collected",
                seq, summary.outcomes
            )));
        }

        Ok(LoadReport::from_snapshot(
            self.counters.snapshot(),
            start.elapsed(),
        ))
    }

    /// Read the header and build the statement. `None` on empty input.
    async fn prepare(&self, source: &mut RecordSource) -> Result<Option<Statement>, LoaderError> {
        let header = match source.next().await {
            None => return Ok(None),
            Some(Ok(header)) => header,
            Some(Err(SourceError::Malformed { line, message })) => {
                return Err(LoaderError::MalformedRecord { line, message });
            }
            Some(Err(SourceError::Io(message))) => return Err(LoaderError::Input(message)),
        };

        let columns = StatementBuilder::columns_from_header(&header.fields)?;
        let casts = self.store.column_casts(&self.table, &columns).await?;
        let statement = self.builder.build(columns, &casts)?;

        log::info!("insert statement: {}", statement.sql());
        Ok(Some(statement))
    }

    /// Next well-formed data record, applying the malformed-record policy.
    async fn next_data_record(
        &self,
        source: &mut RecordSource,
    ) -> Result<Option<Record>, LoaderError> {
        loop {
            match source.next().await {
                None => return Ok(None),
                Some(Ok(record)) => return Ok(Some(record)),
                Some(Err(SourceError::Io(message))) => return Err(LoaderError::Input(message)),
                Some(Err(SourceError::Malformed { line, message })) => match self.malformed_policy
                {
                    MalformedPolicy::Abort => {
                        return Err(LoaderError::MalformedRecord { line, message });
                    }
                    MalformedPolicy::Skip => {
                        log::warn!("skipping malformed record at line {}: {}", line, message);
                        self.counters.record_skip();
                    }
                },
            }
        }
    }
}

fn check_worker(joined: Result<(), JoinError>) -> Result<(), LoaderError> {
    joined.map_err(|err| LoaderError::WorkerPanicked(err.to_string()))
}
