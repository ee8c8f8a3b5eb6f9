//! Insertion statement derived once from the header row.

use crate::error::LoaderError;
use crate::store::Dialect;

/// Immutable parameterized insertion shared by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    columns: Vec<String>,
    upsert: bool,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn is_upsert(&self) -> bool {
        self.upsert
    }
}

/// Settings that shape the statement independently of the header.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    dialect: Dialect,
    table: String,
    upsert: bool,
    conflict_columns: Vec<String>,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            upsert: false,
            conflict_columns: Vec::new(),
        }
    }

    /// Overwrite every column when the inserted key already exists.
    pub fn upsert(mut self, enabled: bool) -> Self {
        self.upsert = enabled;
        self
    }

    /// Conflict target for Postgres upserts. Empty means the first column.
    pub fn conflict_columns(mut self, columns: Vec<String>) -> Self {
        self.conflict_columns = columns;
        self
    }

    /// Trimmed column names from a header row.
    pub fn columns_from_header(header: &[String]) -> Result<Vec<String>, LoaderError> {
        if header.is_empty() {
            return Err(LoaderError::EmptyHeader);
        }

        header
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.trim();
                if name.is_empty() {
                    Err(LoaderError::EmptyColumnName(i + 1))
                } else {
                    Ok(name.to_string())
                }
            })
            .collect()
    }

    /// Build the statement for `columns`.
    ///
    /// `casts` holds one optional SQL type per column; a present type wraps
    /// that column's placeholder in an explicit cast.
    pub fn build(
        &self,
        columns: Vec<String>,
        casts: &[Option<String>],
    ) -> Result<Statement, LoaderError> {
        if columns.is_empty() {
            return Err(LoaderError::EmptyHeader);
        }

        let placeholders: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let placeholder = self.dialect.placeholder(i + 1);
                match casts.get(i).and_then(|cast| cast.as_deref()) {
                    Some(ty) => format!("CAST({} AS {})", placeholder, ty),
                    None => placeholder,
                }
            })
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        if self.upsert {
            sql.push(' ');
            sql.push_str(&self.update_clause(&columns)?);
        }

        Ok(Statement {
            sql,
            columns,
            upsert: self.upsert,
        })
    }

    fn update_clause(&self, columns: &[String]) -> Result<String, LoaderError> {
        match self.dialect {
            Dialect::MySql => {
                let assignments: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{}=VALUES({})", c, c))
                    .collect();
                Ok(format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", ")))
            }
            Dialect::Postgres => {
                let target = if self.conflict_columns.is_empty() {
                    vec![columns[0].clone()]
                } else {
                    for key in &self.conflict_columns {
                        if !columns.contains(key) {
                            return Err(LoaderError::UnknownConflictColumn(key.clone()));
                        }
                    }
                    self.conflict_columns.clone()
                };

                let assignments: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = EXCLUDED.{}", c, c))
                    .collect();
                Ok(format!(
                    "ON CONFLICT ({}) DO UPDATE SET {}",
                    target.join(", "),
                    assignments.join(", ")
                ))
            }
        }
    }
}
