//! Database layer.
//!
//! [`ModuleStore`] defines the interface of the module registry. The default
//! implementation is [`SqliteStore`]. To swap to another database, implement
//! [`ModuleStore`] for the new type; the ingestor is generic over it.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used so that no
//! `DATABASE_URL` environment variable is needed at compile time.

pub mod dao;
pub mod module;

pub use dao::{ModuleRecord, NewModule};
pub use module::ModuleStore;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::StorageError;

/// SQLite-backed module registry.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url`.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://modules.db"`. Call [`SqliteStore::migrate`] before serving
    /// requests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Apply pending schema migrations. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("module registry schema is up to date");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
