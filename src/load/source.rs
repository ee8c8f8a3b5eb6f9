//! Lazy record source over a delimited byte stream.

use csv::{ErrorKind, ReaderBuilder, StringRecord};
use std::io::Read;
use tokio::sync::mpsc;

/// One parsed input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number where the row starts.
    pub line: u64,
    pub fields: Vec<String>,
}

/// Why the source could not produce the next record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Arity or encoding violation. The stream itself is still readable.
    Malformed { line: u64, message: String },
    /// The underlying stream failed; nothing further can be read.
    Io(String),
}

/// Forward-only sequence of records parsed on a blocking thread.
///
/// The parser hands records over through a single-slot channel, so it reads
/// at most one record ahead of the consumer. Dropping the source stops the
/// parser at its next hand-off.
///
/// Tab-delimited input is read without quote handling, so every quote
/// character is kept as field text. Other delimiters honour CSV quoting.
pub struct RecordSource {
    records: mpsc::Receiver<Result<Record, SourceError>>,
}

impl RecordSource {
    pub fn spawn<R>(reader: R, delimiter: u8) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);

        tokio::task::spawn_blocking(move || {
            let mut csv = ReaderBuilder::new()
                .has_headers(false)
                .delimiter(delimiter)
                .quoting(delimiter != b'\t')
                .flexible(false)
                .from_reader(reader);
            let mut row = StringRecord::new();

            loop {
                let item = match csv.read_record(&mut row) {
                    Ok(false) => break,
                    Ok(true) => Ok(Record {
                        line: row.position().map(|pos| pos.line()).unwrap_or_default(),
                        fields: row.iter().map(str::to_string).collect(),
                    }),
                    Err(err) => Err(classify(err)),
                };

                let fatal = matches!(item, Err(SourceError::Io(_)));
                if tx.blocking_send(item).is_err() || fatal {
                    break;
                }
            }
        });

        Self { records: rx }
    }

    /// Next record, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<Record, SourceError>> {
        self.records.recv().await
    }
}

fn classify(err: csv::Error) -> SourceError {
    let line = err
        .position()
        .map(|pos| pos.line())
        .unwrap_or_default();

    match err.into_kind() {
        ErrorKind::Io(io) => SourceError::Io(io.to_string()),
        ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => SourceError::Malformed {
            line,
            message: format!("expected {} fields, found {}", expected_len, len),
        },
        ErrorKind::Utf8 { err, .. } => SourceError::Malformed {
            line,
            message: format!("invalid UTF-8: {}", err),
        },
        other => SourceError::Malformed {
            line,
            message: format!("{:?}", other),
        },
    }
}
