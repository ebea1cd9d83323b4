//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use modhub_core::{Config, Ingestor, SqliteStore};

use crate::views::Views;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Module registry.
    pub store: Arc<SqliteStore>,
    /// Upload → extract → register workflow, sharing `store`.
    pub ingestor: Arc<Ingestor<SqliteStore>>,
    /// Compiled HTML templates.
    pub views: Arc<Views>,
}

impl AppState {
    /// Wire the components together. `store` must already be migrated.
    pub fn new(config: Config, store: SqliteStore) -> Result<Self, minijinja::Error> {
        let store = Arc::new(store);
        let ingestor = Arc::new(Ingestor::new(Arc::clone(&store), &config));
        Ok(Self {
            config: Arc::new(config),
            store,
            ingestor,
            views: Arc::new(Views::new()?),
        })
    }
}
