//! Module upload, listing and deletion.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use modhub_core::{ModuleStore, ModuleUpload};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::modules::{AddModuleUpload, DeleteModuleResponse, ModuleResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(add_module, list_modules, delete_module),
    components(schemas(AddModuleUpload, ModuleResponse, DeleteModuleResponse))
)]
pub struct ModulesApi;

/// Register module routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add-module", post(add_module))
        .route("/modules", get(list_modules))
        .route("/delete-module/{module_id}", delete(delete_module))
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        ServerError::BadRequest(format!("Failed to read multipart field: {}", e.body_text()))
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes")
}

/// Upload and ingest a module archive (`POST /add-module`).
///
/// Expects `multipart/form-data` with a `module_name` text field and a
/// `file` field declared as `application/zip`. On success the client is
/// redirected to the dashboard.
#[utoipa::path(
    post,
    path = "/add-module",
    tag = "modules",
    request_body(content = AddModuleUpload, content_type = "multipart/form-data"),
    responses(
        (status = 303, description = "Module ingested; redirect to the dashboard"),
        (status = 400, description = "Wrong content type, invalid ZIP file or missing field"),
        (status = 409, description = "A module with this name already exists"),
        (status = 413, description = "Archive too large"),
        (status = 500, description = "Storage error"),
    )
)]
pub async fn add_module(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Redirect, ServerError> {
    let mut module_name: Option<String> = None;
    let mut file: Option<(String, String, Bytes)> = None;
    let mut overwrite = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field_name.as_str() {
            "module_name" => module_name = Some(field.text().await.map_err(multipart_error)?),
            "overwrite" => overwrite = parse_flag(&field.text().await.map_err(multipart_error)?),
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.zip").to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let data = field.bytes().await.map_err(multipart_error)?;
                debug!(
                    file_name = %file_name,
                    content_type = %content_type,
                    size_bytes = data.len(),
                    "received module archive"
                );
                file = Some((file_name, content_type, data));
            }
            other => debug!(field = %other, "ignoring unknown multipart field"),
        }
    }

    let module_name =
        module_name.ok_or_else(|| ServerError::BadRequest("module_name is required".into()))?;
    let (original_filename, content_type, archive) =
        file.ok_or_else(|| ServerError::BadRequest("file is required".into()))?;

    state
        .ingestor
        .ingest(ModuleUpload {
            module_name,
            archive,
            original_filename,
            content_type,
            overwrite,
        })
        .await?;

    Ok(Redirect::to("/"))
}

/// List every module record (`GET /modules`).
#[utoipa::path(
    get,
    path = "/modules",
    tag = "modules",
    responses(
        (status = 200, description = "All module records in upload order", body = [ModuleResponse])
    )
)]
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModuleResponse>>, ServerError> {
    let modules = state
        .store
        .list_modules()
        .await
        .map_err(modhub_core::CoreError::from)?;
    Ok(Json(modules.into_iter().map(ModuleResponse::from).collect()))
}

/// Delete a module record and its files (`DELETE /delete-module/{module_id}`).
#[utoipa::path(
    delete,
    path = "/delete-module/{module_id}",
    tag = "modules",
    params(("module_id" = i64, Path, description = "Module identifier")),
    responses(
        (status = 200, description = "Module deleted", body = DeleteModuleResponse),
        (status = 400, description = "module_id is not an integer"),
        (status = 404, description = "Module not found"),
    )
)]
pub async fn delete_module(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
) -> Result<Json<DeleteModuleResponse>, ServerError> {
    let id: i64 = module_id
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid module id: {module_id}")))?;

    state.ingestor.remove(id).await?;

    Ok(Json(DeleteModuleResponse {
        message: "Module deleted successfully".into(),
        id,
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
