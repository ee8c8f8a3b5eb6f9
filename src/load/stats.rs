//! Load statistics.
//!
//! Counters are atomics so the status reporter can read them at any time.
//! `completed`, `failed` and the in-flight decrement are written only by the
//! completion collector; the orchestrator owns `dispatched`, `skipped` and the
//! in-flight increment.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct LoadCounters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_flight: u64,
    pub peak_in_flight: u64,
    pub skipped: u64,
}

impl LoadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task was admitted and handed to a worker.
    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// A task's outcome was accounted for.
    pub fn record_completion(&self, succeeded: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Final statistics of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Insertions attempted (equals data rows dispatched).
    pub insertions: u64,
    /// Insertions that did not fail.
    pub valid_insertions: u64,
    pub failed: u64,
    pub skipped: u64,
    pub peak_in_flight: u64,
    pub throughput: f64,
    pub valid_throughput: f64,
}

impl LoadReport {
    pub fn from_snapshot(snapshot: CounterSnapshot, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate = |count: u64| {
            if secs > 0.0 {
                count as f64 / secs
            } else {
                0.0
            }
        };
        let valid = snapshot.completed.saturating_sub(snapshot.failed);

        Self {
            elapsed,
            insertions: snapshot.completed,
            valid_insertions: valid,
            failed: snapshot.failed,
            skipped: snapshot.skipped,
            peak_in_flight: snapshot.peak_in_flight,
            throughput: rate(snapshot.completed),
            valid_throughput: rate(valid),
        }
    }
}

fn serialize_secs<S>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Execution time: {:?}", self.elapsed)?;
        writeln!(
            f,
            "Status: {} insertions, {} valid insertions",
            self.insertions, self.valid_insertions
        )?;
        if self.skipped > 0 {
            writeln!(f, "Skipped malformed rows: {}", self.skipped)?;
        }
        write!(
            f,
            "QPS: {:.0}, Valid QPS: {:.0}",
            self.throughput, self.valid_throughput
        )
    }
}
