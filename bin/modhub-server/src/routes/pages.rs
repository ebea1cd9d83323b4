//! Server-rendered HTML pages.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use modhub_core::{CoreError, ModuleStore};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(dashboard, add_module_form, module_management))]
pub struct PagesApi;

/// Register page routes. `POST /add-module` lives in the modules router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard))
        .route("/add-module", get(add_module_form))
        .route("/module-mng", get(module_management))
}

/// Dashboard listing every module.
#[utoipa::path(
    get,
    path = "/",
    tag = "pages",
    responses((status = 200, description = "Dashboard page", body = String, content_type = "text/html"))
)]
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    let modules = state.store.list_modules().await.map_err(CoreError::from)?;
    state.views.dashboard(modules)
}

/// Upload form.
#[utoipa::path(
    get,
    path = "/add-module",
    tag = "pages",
    responses((status = 200, description = "Upload form", body = String, content_type = "text/html"))
)]
pub async fn add_module_form(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, ServerError> {
    state.views.add_module()
}

/// Management page with per-module delete controls.
#[utoipa::path(
    get,
    path = "/module-mng",
    tag = "pages",
    responses((status = 200, description = "Module management page", body = String, content_type = "text/html"))
)]
pub async fn module_management(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, ServerError> {
    let modules = state.store.list_modules().await.map_err(CoreError::from)?;
    state.views.module_management(modules)
}
