//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Per-request trace-ID middleware
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `MODHUB_ENABLE_SWAGGER=false`)
//! - Health route, HTML pages and the module API
//! - Static assets under `/static`

pub mod doc;
mod health;
mod modules;
mod pages;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::trace;
use crate::state::AppState;

/// Headroom on top of the archive limit for multipart framing and text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    let mut app = Router::new()
        .merge(health::router())
        .merge(pages::router())
        .merge(modules::router())
        .nest_service("/static", ServeDir::new(&state.config.static_dir));

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
