//! Database module
//!
//! Schema bootstrap, row models and the repository through which every
//! query runs.

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Connection tuning for the entry database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long a writer waits on a locked database
    pub busy_timeout: Duration,
    /// How long a caller waits for a free pooled connection
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// WAL with NORMAL sync; writers wait `busy_timeout` on a locked file.
fn connect_options(db_path: &Path, config: &PoolConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout)
        .foreign_keys(true)
}

/// Open the entry database at `db_path`, migrating it first.
///
/// Migrations get their own single connection, closed before the shared pool
/// opens, so every pooled connection starts on the migrated schema.
pub async fn create_pool(db_path: &Path, config: PoolConfig) -> Result<SqlitePool> {
    tracing::info!("Opening entry database at {:?}", db_path);

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = connect_options(db_path, &config);

    let migrator = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await?;
    initialize_database(&migrator).await?;
    migrator.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    tracing::info!(
        "Entry database ready ({} connections max)",
        config.max_connections.max(1)
    );
    Ok(pool)
}
