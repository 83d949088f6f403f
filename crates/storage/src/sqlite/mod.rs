use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;
use tracing::debug;

use crate::repository::{KeyValueStore, Storage};

mod kv_repo;
mod migrate;

const MEMORY_URL: &str = "sqlite::memory:";

/// Pool tuning for [`SqliteRepository::connect_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteOptions {
    /// A private `sqlite::memory:` database exists per connection, so the
    /// pool is pinned to one.
    fn for_url(self, database_url: &str) -> Self {
        if database_url == MEMORY_URL {
            Self {
                max_connections: 1,
                ..self
            }
        } else {
            self
        }
    }
}

/// Key/value store kept in a single `kv_entries` table.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect with [`SqliteOptions::default`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or
    /// a connection pragma fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, SqliteOptions::default()).await
    }

    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or
    /// a connection pragma fails.
    pub async fn connect_with(
        database_url: &str,
        options: SqliteOptions,
    ) -> Result<Self, SqliteInitError> {
        let options = options.for_url(database_url);
        let busy_ms = options.busy_timeout.as_millis();
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query(&format!("PRAGMA busy_timeout = {busy_ms};"))
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        debug!(max_connections = options.max_connections, "sqlite pool ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Storage over a migrated `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self::from_store(Arc::new(repo) as Arc<dyn KeyValueStore>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_memory_databases_use_one_connection() {
        let options = SqliteOptions::default();
        assert_eq!(options.for_url(MEMORY_URL).max_connections, 1);
        assert_eq!(
            options.for_url("sqlite://quiz.sqlite3").max_connections,
            options.max_connections
        );
    }

    #[tokio::test]
    async fn memory_store_keeps_values_across_calls() {
        let storage = Storage::sqlite(MEMORY_URL).await.unwrap();
        storage.kv.set("quiz_a_history", "[]").await.unwrap();
        assert_eq!(
            storage.kv.get("quiz_a_history").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
