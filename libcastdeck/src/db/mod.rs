//! Database operations for Castdeck
//!
//! One SQLite database holds every table. The request path and the dispatch
//! loop may run in different processes; they coordinate only through
//! conditional UPDATE statements on `scheduled_posts`, never through shared
//! memory.
//!
//! Methods are grouped by table in submodules, all on [`Database`].

mod accounts;
mod engagement;
mod hashtags;
mod media;
mod notifications;
mod posts;
mod templates;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DbError, Result};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // Forward slashes keep the URL valid on Windows too
        let db_url = format!("sqlite://{}", expanded_path.replace('\\', "/"));
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(DbError::SqlxError)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        tracing::debug!("Database ready at {}", expanded_path);

        Ok(Self { pool })
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Convert a stored unix timestamp back into a UTC datetime
fn from_ts(table: &'static str, secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        DbError::CorruptRow {
            table,
            reason: format!("timestamp out of range: {}", secs),
        }
        .into()
    })
}

fn from_opt_ts(table: &'static str, secs: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    secs.map(|s| from_ts(table, s)).transpose()
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> crate::CastdeckError {
    DbError::CorruptRow {
        table,
        reason: reason.into(),
    }
    .into()
}
