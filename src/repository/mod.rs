//! Repository layer for database operations

pub mod agents;
pub mod metadata;
pub mod records;

use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::config::DatabaseConfig;

/// Main repository struct holding the database connection pool.
///
/// Constructed explicitly and handed to services, so tests can run against
/// an in-memory store.
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Sqlite>,
    pub records: records::RecordsRepository,
    pub agents: agents::AgentsRepository,
    pub metadata: metadata::MetadataRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            records: records::RecordsRepository::new(pool.clone()),
            agents: agents::AgentsRepository::new(pool.clone()),
            metadata: metadata::MetadataRepository::new(pool.clone()),
            pool,
        }
    }

    /// Open (creating if needed) the database file and run migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        if let Some(parent) = options.clone().get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // A single never-recycled connection keeps the memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection; pending queries finish first
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
