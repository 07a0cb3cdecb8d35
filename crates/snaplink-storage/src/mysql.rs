use async_trait::async_trait;
use snaplink_core::backend::{Backend, InsertOutcome};
use snaplink_core::error::{Result, StorageError};
use snaplink_core::ShortCode;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySqlPool, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, trace};
use typed_builder::TypedBuilder;

const SCHEMA: &str = include_str!("../ddl/mysql/short_links.sql");

/// Pool and timeout configuration for [`MySqlBackend::connect`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MySqlSettings {
    #[builder(default = 5)]
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    #[builder(default = Duration::from_secs(3))]
    pub acquire_timeout: Duration,
    /// Upper bound for a single statement, including connection acquisition.
    #[builder(default = Duration::from_secs(3))]
    pub operation_timeout: Duration,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// MySQL implementation of the [`Backend`] trait.
///
/// Codes live in the `short_links` table keyed by `short_id`. Uniqueness is
/// left to the primary key: an insert that trips it reports
/// [`InsertOutcome::AlreadyExists`], so no read-then-write race exists
/// between concurrent processes sharing the table.
#[derive(Debug, Clone)]
pub struct MySqlBackend {
    pool: MySqlPool,
    operation_timeout: Duration,
}

impl MySqlBackend {
    /// Creates a backend from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            operation_timeout: MySqlSettings::default().operation_timeout,
        }
    }

    /// Creates a backend by opening a new MySQL connection pool.
    pub async fn connect(dsn: &str, settings: MySqlSettings) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(dsn)
            .await
            .map_err(map_sqlx_error)?;

        debug!(max_connections = settings.max_connections, "mysql pool opened");

        Ok(Self {
            pool,
            operation_timeout: settings.operation_timeout,
        })
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(StorageError::Timeout(format!(
                "{op} exceeded {:?}",
                self.operation_timeout
            ))),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl Backend for MySqlBackend {
    fn name(&self) -> &'static str {
        "mysql"
    }

    /// Creates the `short_links` table if needed. Rows are read on demand,
    /// so nothing is restored into memory.
    async fn initialize(&self) -> Result<usize> {
        self.timed("create schema", sqlx::query(SCHEMA).execute(&self.pool))
            .await?;
        info!("mysql schema ready");
        Ok(0)
    }

    async fn insert_if_absent(&self, code: &ShortCode, target: &str) -> Result<InsertOutcome> {
        let insert = sqlx::query(
            r#"
            INSERT INTO short_links (short_id, long_url)
            VALUES (?, ?)
            "#,
        )
        .bind(code.as_str())
        .bind(target)
        .execute(&self.pool);

        match tokio::time::timeout(self.operation_timeout, insert).await {
            Ok(Ok(_)) => Ok(InsertOutcome::Inserted),
            Ok(Err(err)) if is_unique_violation(&err) => {
                trace!(code = %code, "code already taken");
                Ok(InsertOutcome::AlreadyExists)
            }
            Ok(Err(err)) => Err(map_sqlx_error(err)),
            Err(_) => Err(StorageError::Timeout(format!(
                "insert exceeded {:?}",
                self.operation_timeout
            ))),
        }
    }

    async fn lookup(&self, code: &ShortCode) -> Result<Option<String>> {
        let row = self
            .timed(
                "lookup",
                sqlx::query(
                    r#"
                    SELECT long_url
                    FROM short_links
                    WHERE short_id = ?
                    LIMIT 1
                    "#,
                )
                .bind(code.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        row.map(|row| row.try_get::<String, _>("long_url"))
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
