use crate::load::admission::Admission;

/// Textual marker for a SQL NULL in the input.
pub const NULL_MARKER: &str = "NULL";

/// One data row converted into store-ready arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// 1-based position among data rows (header excluded).
    pub seq: u64,
    pub args: Vec<Option<String>>,
}

impl Task {
    pub fn new(seq: u64, fields: Vec<String>) -> Self {
        let args = fields
            .into_iter()
            .map(|field| if field == NULL_MARKER { None } else { Some(field) })
            .collect();
        Self { seq, args }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Inserted { rows_affected: u64 },
    Failed,
}

/// Result of one task, sent by its worker to the collector.
#[derive(Debug)]
pub struct Outcome {
    pub seq: u64,
    pub status: OutcomeStatus,
    pub admission: Admission,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, OutcomeStatus::Inserted { .. })
    }
}
