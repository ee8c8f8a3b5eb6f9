pub mod config;
pub mod error;
pub mod load;
pub mod store;

use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::load::{LoadReport, Pipeline, RecordSource};
use crate::store::SqlStore;
use std::io::Read;
use std::sync::Arc;

/// Connect to the configured store and load every record from `input`.
pub async fn run<R>(config: &LoaderConfig, input: R) -> Result<LoadReport, LoaderError>
where
    R: Read + Send + 'static,
{
    let pool_size = u32::try_from(config.max_concurrency).unwrap_or(u32::MAX);
    let store = Arc::new(SqlStore::connect(&config.connection_string, pool_size).await?);

    let pipeline = Pipeline::new(store.clone(), config);
    let source = RecordSource::spawn(input, config.delimiter);
    let report = pipeline.run(source).await;

    store.close().await;
    report
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::load::Statement;
    use crate::store::{Dialect, InsertStore};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub use database::{TestDatabase, TestDatabaseError};

    type RowPredicate = Box<dyn Fn(&[Option<String>]) -> bool + Send + Sync>;

    /// In-memory `InsertStore` that records rows and tracks concurrency.
    pub struct MemoryStore {
        dialect: Dialect,
        latency: Duration,
        reject: Option<RowPredicate>,
        rows: Mutex<Vec<Vec<Option<String>>>>,
        statements: Mutex<Vec<String>>,
        active: AtomicUsize,
        peak: AtomicUsize,
        executions: AtomicUsize,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self {
                dialect: Dialect::MySql,
                latency: Duration::ZERO,
                reject: None,
                rows: Mutex::new(Vec::new()),
                statements: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
            }
        }

        /// Base latency per call. Calls cycle through 1x..4x of it so
        /// completions arrive out of order.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Fail every insertion whose arguments match `predicate`.
        pub fn rejecting<F>(mut self, predicate: F) -> Self
        where
            F: Fn(&[Option<String>]) -> bool + Send + Sync + 'static,
        {
            self.reject = Some(Box::new(predicate));
            self
        }

        pub fn with_dialect(mut self, dialect: Dialect) -> Self {
            self.dialect = dialect;
            self
        }

        /// Rows accepted so far, in completion order.
        pub fn rows(&self) -> Vec<Vec<Option<String>>> {
            self.rows.lock().expect("rows lock poisoned").clone()
        }

        /// Distinct statement texts executed so far.
        pub fn statements(&self) -> Vec<String> {
            self.statements
                .lock()
                .expect("statements lock poisoned")
                .clone()
        }

        /// Highest number of calls that were executing at the same time.
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn executions(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl InsertStore for MemoryStore {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        async fn column_casts(
            &self,
            _table: &str,
            columns: &[String],
        ) -> Result<Vec<Option<String>>, sqlx::Error> {
            Ok(vec![None; columns.len()])
        }

        async fn execute(
            &self,
            statement: &Statement,
            args: &[Option<String>],
        ) -> Result<u64, sqlx::Error> {
            let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            let call = self.executions.fetch_add(1, Ordering::SeqCst);

            if !self.latency.is_zero() {
                let factor = (call % 4) as u32 + 1;
                tokio::time::sleep(self.latency * factor).await;
            }

            {
                let mut statements = self.statements.lock().expect("statements lock poisoned");
                if !statements.iter().any(|sql| sql == statement.sql()) {
                    statements.push(statement.sql().to_string());
                }
            }

            let columns = statement.columns();
            let result = if args.len() != columns.len() {
                Err(sqlx::Error::Protocol(format!(
                    "column count doesn't match value count: ({}) got {} values",
                    columns.join(", "),
                    args.len()
                )))
            } else if self.reject.as_ref().is_some_and(|reject| reject(args)) {
                Err(sqlx::Error::Protocol("duplicate entry for key 'PRIMARY'".to_string()))
            } else {
                self.rows
                    .lock()
                    .expect("rows lock poisoned")
                    .push(args.to_vec());
                Ok(1)
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    pub mod database {
        use sqlx::postgres::{PgPool, PgPoolOptions};
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Disposable Postgres server with a freshly created database.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            url: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect(&admin_url)
                    .await?;

                let database_name = format!("loader_{}", Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\"", database_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let url = format!(
                    "postgres://postgres:postgres@{}:{}/{}",
                    host, port, database_name
                );
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&url)
                    .await?;

                Ok(Self {
                    pool: Some(pool),
                    url,
                    container: Some(container),
                })
            }

            /// Connection string for the test database.
            pub fn url(&self) -> &str {
                &self.url
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Close the pool and stop the container.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }
                if let Some(container) = self.container.take() {
                    container.stop().await?;
                }
                Ok(())
            }
        }
    }
}
