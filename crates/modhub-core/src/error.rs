//! Error taxonomy shared by the ingestion handler and the module registry.

use std::path::PathBuf;

use thiserror::Error;

/// Message returned to clients when the declared content type is wrong.
pub const ONLY_ZIP_ALLOWED: &str = "Only ZIP files are allowed.";

/// Message returned to clients when the archive cannot be read.
pub const INVALID_ZIP: &str = "Invalid ZIP file.";

/// All errors produced by modhub-core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller supplied something we refuse to ingest.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The payload is not a readable ZIP archive.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// The module name is already registered or being ingested.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No module with the requested identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The filesystem or the database could not complete a write.
    #[error(transparent)]
    StorageUnavailable(#[from] StorageError),
}

/// Underlying cause of [`CoreError::StorageUnavailable`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::StorageUnavailable(StorageError::Database(e))
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        CoreError::StorageUnavailable(StorageError::Join(e))
    }
}

impl CoreError {
    /// Wrap an I/O failure on `path`.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::StorageUnavailable(StorageError::Io {
            context,
            path: path.into(),
            source,
        })
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
