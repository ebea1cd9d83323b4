use modhub_core::ModuleRecord;
use serde::Serialize;
use utoipa::ToSchema;

/// One registry row as returned by `GET /modules`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModuleResponse {
    pub id: i64,
    pub module_name: String,
    /// RFC 3339 timestamp of the successful ingestion.
    pub uploaded_time: String,
    /// Original archive name.
    pub filename: String,
    /// Archive size in bytes.
    pub file_size: i64,
    /// Entry names in archive order.
    pub extracted_files: Vec<String>,
}

impl From<ModuleRecord> for ModuleResponse {
    fn from(record: ModuleRecord) -> Self {
        Self {
            id: record.id,
            module_name: record.module_name,
            uploaded_time: record.uploaded_time.to_rfc3339(),
            filename: record.filename,
            file_size: record.file_size,
            extracted_files: record.extracted_files,
        }
    }
}

/// Multipart body of `POST /add-module` (documentation only).
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct AddModuleUpload {
    pub module_name: String,
    /// ZIP archive, sent with content type `application/zip`.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// `true`, `on` or `1` replaces an existing module with the same name.
    pub overwrite: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteModuleResponse {
    pub message: String,
    pub id: i64,
}
