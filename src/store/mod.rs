//! Tracking Store (design doc §4.1): durable, transactional persistence of
//! the data model in §3 over an embedded SQLite database, safe for many
//! concurrent workers on one host. Writes serialize through a store-internal
//! mutex (§4.1 Concurrency discipline); reads proceed concurrently through
//! the pool.

pub mod errors;
pub mod media;
pub mod models;
pub mod quality;
pub mod status;

pub use models::*;

use crate::error::{PipelineError, Result};
use sqlx::sqlite::{SqlitePoolOptions, SqliteConnectOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

/// Handle to the tracking store. Cheap to clone — the pool and write lock
/// are both reference-counted internally.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    write_lock: std::sync::Arc<Mutex<()>>,
}

impl Store {
    /// Open (creating if needed) the SQLite database at `path` and run
    /// migrations. Schema errors here are fatal to process startup (§7).
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(20)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            write_lock: std::sync::Arc::new(Mutex::new(())),
        })
    }

    /// In-memory store for tests — still runs migrations, still serializes
    /// writes the same way production does.
    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            write_lock: std::sync::Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Acquire the store-internal write lock for the duration of one
    /// logical write operation. All multi-statement operations additionally
    /// run inside one SQL transaction so a failure rolls back cleanly.
    pub(crate) async fn write_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
