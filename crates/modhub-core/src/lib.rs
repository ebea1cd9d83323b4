//! modhub-core: the module registry and the ingestion workflow behind the
//! modhub dashboard.
//!
//! - [`entities`]: SQLite-backed [`ModuleStore`] and its records.
//! - [`ingest`]: [`Ingestor`], which turns an uploaded ZIP archive into an
//!   extracted module directory plus a registry row.
//! - [`config`]: the explicit [`Config`] both of them are built from.

pub mod config;
pub mod entities;
pub mod error;
pub mod ingest;

pub use config::Config;
pub use entities::{ModuleRecord, ModuleStore, NewModule, SqliteStore};
pub use error::{CoreError, StorageError, INVALID_ZIP, ONLY_ZIP_ALLOWED};
pub use ingest::{Ingestor, ModuleUpload, ZIP_CONTENT_TYPE};
