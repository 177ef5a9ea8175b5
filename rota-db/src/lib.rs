//! Database layer for Rota
//!
//! Provides SQLite persistence for teams, users, pull requests and their
//! reviewer assignments, exposed to the engine as a [`SqliteStore`].

pub mod error;
pub mod repos;
pub mod store;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub use error::{Error, Result};
pub use store::{SqliteStore, SqliteTx};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection from a file path
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::connect(db_path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open (or create) the database with a bounded pool and run migrations
    pub async fn connect(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("Failed to create database directory: {}", e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;

        debug!(path = %db_path.display(), max_connections, "Database ready");
        Ok(Self { pool })
    }

    /// Get the default database path (~/.cache/rota/rota.db)
    pub fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Io("Could not determine cache directory".to_string()))?;
        Ok(cache_dir.join("rota").join("rota.db"))
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Engine-facing store sharing this pool
    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }
}
