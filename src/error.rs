use thiserror::Error;

/// Conditions that stop a load run before a final report is produced.
///
/// Per-record insertion failures are deliberately absent: those stay inside
/// their worker as `sqlx::Error` values and only show up in the counters.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("unsupported connection string: expected a postgres:// or mysql:// url")]
    UnsupportedConnectionString,
    #[error("database unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: u64, message: String },
    #[error("failed to read input: {0}")]
    Input(String),
    #[error("header row has no columns")]
    EmptyHeader,
    #[error("header column {0} has an empty name")]
    EmptyColumnName(usize),
    #[error("conflict column '{0}' is not present in the header")]
    UnknownConflictColumn(String),
    #[error("admission controller closed")]
    AdmissionClosed,
    #[error("insert worker panicked: {0}")]
    WorkerPanicked(String),
    #[error("completion collector failed: {0}")]
    CollectorFailed(String),
}
