//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** storage errors are logged with full detail but only a
//! generic message is returned to the caller so that file paths or SQL never
//! leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use modhub_core::{CoreError, INVALID_ZIP};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the modhub-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the ingestion workflow or the registry.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The upload exceeded the configured body limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// A view template failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),

            ServerError::Core(e) => match e {
                // Client-facing errors: expose the message directly.
                CoreError::InvalidInput(m) => (StatusCode::BAD_REQUEST, m.clone()),
                CoreError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
                CoreError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
                CoreError::CorruptArchive(detail) => {
                    tracing::debug!(detail = %detail, "rejected corrupt archive");
                    (StatusCode::BAD_REQUEST, INVALID_ZIP.to_owned())
                }
                // Internal errors: log the full detail, keep it private.
                CoreError::StorageUnavailable(source) => {
                    error!(error = %source, "storage unavailable");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal server error".to_owned(),
                    )
                }
            },

            ServerError::Template(e) => {
                error!(error = %e, "template rendering failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use modhub_core::ONLY_ZIP_ALLOWED;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_input_is_bad_request_with_message() {
        let resp = ServerError::from(CoreError::InvalidInput(ONLY_ZIP_ALLOWED.into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], ONLY_ZIP_ALLOWED);
    }

    #[tokio::test]
    async fn corrupt_archive_hides_detail() {
        let resp =
            ServerError::from(CoreError::CorruptArchive("EOCD missing".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], INVALID_ZIP);
    }

    #[tokio::test]
    async fn storage_errors_are_generic() {
        let err = CoreError::from(disk_full());
        let resp = ServerError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await["error"], "internal server error");
    }

    #[tokio::test]
    async fn not_found_and_conflict_statuses() {
        let nf = ServerError::from(CoreError::NotFound("module 7 not found".into())).into_response();
        assert_eq!(nf.status(), StatusCode::NOT_FOUND);
        let cf = ServerError::from(CoreError::Conflict("exists".into())).into_response();
        assert_eq!(cf.status(), StatusCode::CONFLICT);
    }

    fn disk_full() -> modhub_core::StorageError {
        modhub_core::StorageError::Io {
            context: "failed to store archive",
            path: "/srv/uploads/a.zip".into(),
            source: std::io::Error::other("disk full"),
        }
    }
}
