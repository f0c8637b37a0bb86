//! `SQLite` backend for the question bank and the key-value slots.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{KeyValueStore, QuestionRepository, Storage};

mod kv_repo;
mod mapping;
mod migrate;
mod question_repo;

/// Pool and locking settings for the question database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SqliteSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Write-ahead logging; ignored by in-memory databases.
    pub wal: bool,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }
}

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("invalid database url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the question database at `database_url` with default settings.
    /// A missing database file is created.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::InvalidUrl` for a URL `SQLite` cannot parse
    /// and `SqliteInitError::Sqlx` if the pool cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, SqliteSettings::default()).await
    }

    /// # Errors
    ///
    /// Same as [`Self::connect`].
    pub async fn connect_with(
        database_url: &str,
        settings: SqliteSettings,
    ) -> Result<Self, SqliteInitError> {
        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|source| SqliteInitError::InvalidUrl {
                url: database_url.to_owned(),
                source,
            })?
            .create_if_missing(true)
            .busy_timeout(settings.busy_timeout);
        if settings.wal {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await?;
        tracing::debug!(
            url = database_url,
            max_connections = settings.max_connections,
            "question database opened"
        );
        Ok(Self { pool })
    }

    /// Private in-memory database shared by every connection in the pool.
    /// Each `name` is a separate database for the life of the pool.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Sqlx` if the pool cannot be opened.
    pub async fn in_memory(name: &str) -> Result<Self, SqliteInitError> {
        let settings = SqliteSettings {
            wal: false,
            ..SqliteSettings::default()
        };
        Self::connect_with(&format!("sqlite:file:{name}?mode=memory&cache=shared"), settings).await
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to the latest version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration step fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    fn into_storage(self) -> Storage {
        let questions: Arc<dyn QuestionRepository> = Arc::new(self.clone());
        let kv: Arc<dyn KeyValueStore> = Arc::new(self);
        Storage { questions, kv }
    }
}

impl Storage {
    /// Question bank and key-value slots in one migrated `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo.into_storage())
    }
}
