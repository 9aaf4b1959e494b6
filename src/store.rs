//! Per-request database access.
//!
//! The store holds only the database URL. Each unit of work opens its own
//! connection and closes it when done, whether the work succeeded or not.

use crate::config::database;
use crate::errors::{Error, Result};
use sea_orm::DatabaseConnection;
use std::future::Future;
use tracing::{instrument, warn};

/// Handle to the `SQLite` database file; cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    database_url: String,
}

impl Store {
    /// Creates a store for the `SQLite` file at `database_path`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for in-memory paths: every connection would see its
    /// own empty database, so nothing written would survive the request.
    pub fn new(database_path: &str) -> Result<Self> {
        let path = database_path.trim();
        if path.is_empty() || path == ":memory:" || path.starts_with("file::memory:") {
            return Err(Error::Config {
                message: format!(
                    "DATABASE_PATH must name a file, got {database_path:?} (in-memory databases are not shared between connections)"
                ),
            });
        }
        Ok(Self {
            database_url: database::get_database_url(path),
        })
    }

    /// Opens a fresh connection. Callers own closing it; prefer [`Store::scoped`].
    pub async fn connect(&self) -> Result<DatabaseConnection> {
        database::create_connection(&self.database_url).await
    }

    /// Runs `work` on a fresh connection and closes the connection afterwards.
    ///
    /// The outcome of `work` is returned unchanged; a failure to close is only logged.
    pub async fn scoped<T, F, Fut>(&self, work: F) -> Result<T>
    where
        F: FnOnce(DatabaseConnection) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let db = self.connect().await?;
        let outcome = work(db.clone()).await;
        if let Err(e) = db.close().await {
            warn!("Failed to close database connection: {}", e);
        }
        outcome
    }

    /// Creates the table and runs the `purchase_by` column check.
    #[instrument(skip(self), fields(url = %self.database_url))]
    pub async fn prepare(&self) -> Result<()> {
        self.scoped(|db| async move { database::prepare_schema(&db).await })
            .await
    }
}
