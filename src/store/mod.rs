//! Relational store access.
//!
//! The pipeline only needs a single primitive from the store: run one
//! parameterized insertion with one positional argument list. `InsertStore`
//! is that seam; `SqlStore` implements it over `sqlx` pools for Postgres and
//! MySQL, and `test_support::MemoryStore` implements it in memory.

pub mod mysql;
pub mod postgres;

use crate::error::LoaderError;
use crate::load::statement::Statement;
use sqlx::mysql::MySqlPool;
use sqlx::postgres::PgPool;
use std::future::Future;

/// SQL flavour spoken by the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    /// Detect the dialect from a connection url scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once("://").map(|(scheme, _)| scheme)?;
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            _ => None,
        }
    }

    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::MySql => "?".to_string(),
        }
    }
}

/// Black-box prepare/execute primitive used by insert workers.
pub trait InsertStore: Send + Sync + 'static {
    fn dialect(&self) -> Dialect;

    /// SQL types to cast each text argument to, in column order.
    ///
    /// `None` leaves the placeholder bare and lets the server coerce.
    fn column_casts(
        &self,
        table: &str,
        columns: &[String],
    ) -> impl Future<Output = Result<Vec<Option<String>>, sqlx::Error>> + Send;

    /// Execute `statement` once with `args`, returning rows affected.
    ///
    /// Any per-call server resource must be released before this returns,
    /// on success and failure alike.
    fn execute(
        &self,
        statement: &Statement,
        args: &[Option<String>],
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

/// Pooled connection to a Postgres or MySQL server.
#[derive(Clone)]
pub enum SqlStore {
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl SqlStore {
    /// Open a pool of at most `max_connections` and verify the server answers.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LoaderError> {
        let dialect = Dialect::from_url(url).ok_or(LoaderError::UnsupportedConnectionString)?;

        let store = match dialect {
            Dialect::Postgres => SqlStore::Postgres(
                postgres::connect(url, max_connections)
                    .await
                    .map_err(LoaderError::Unreachable)?,
            ),
            Dialect::MySql => SqlStore::MySql(
                mysql::connect(url, max_connections)
                    .await
                    .map_err(LoaderError::Unreachable)?,
            ),
        };

        log::info!(
            "connected to {:?} store (pool size {})",
            dialect,
            max_connections
        );
        Ok(store)
    }

    pub async fn close(&self) {
        match self {
            SqlStore::Postgres(pool) => pool.close().await,
            SqlStore::MySql(pool) => pool.close().await,
        }
    }
}

impl InsertStore for SqlStore {
    fn dialect(&self) -> Dialect {
        match self {
            SqlStore::Postgres(_) => Dialect::Postgres,
            SqlStore::MySql(_) => Dialect::MySql,
        }
    }

    async fn column_casts(
        &self,
        table: &str,
        columns: &[String],
    ) -> Result<Vec<Option<String>>, sqlx::Error> {
        match self {
            SqlStore::Postgres(pool) => postgres::column_types(pool, table, columns).await,
            SqlStore::MySql(_) => Ok(vec![None; columns.len()]),
        }
    }

    async fn execute(
        &self,
        statement: &Statement,
        args: &[Option<String>],
    ) -> Result<u64, sqlx::Error> {
        match self {
            SqlStore::Postgres(pool) => postgres::execute(pool, statement.sql(), args).await,
            SqlStore::MySql(pool) => mysql::execute(pool, statement.sql(), args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_detected_from_scheme() {
        assert_eq!(
            Dialect::from_url("postgres://u:p@localhost/db"),
            Some(Dialect::Postgres)
        );
        assert_eq!(
            Dialect::from_url("PostgreSQL://localhost/db"),
            Some(Dialect::Postgres)
        );
        assert_eq!(
            Dialect::from_url("mysql://root@127.0.0.1:4000/test"),
            Some(Dialect::MySql)
        );
        assert_eq!(Dialect::from_url("user:@tcp(host:3306)/db"), None);
        assert_eq!(Dialect::from_url("sqlite://data.db"), None);
    }

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
    }
}
