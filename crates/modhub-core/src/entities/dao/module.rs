use chrono::{DateTime, Utc};
use serde::Serialize;

/// A row in the `modules` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    pub id: i64,
    pub module_name: String,
    pub uploaded_time: DateTime<Utc>,
    /// Original archive name as submitted by the client.
    pub filename: String,
    /// Byte length of the stored archive.
    pub file_size: i64,
    /// Entry names in archive order.
    pub extracted_files: Vec<String>,
}

/// A module record before the registry has assigned its `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModule {
    pub module_name: String,
    pub uploaded_time: DateTime<Utc>,
    pub filename: String,
    pub file_size: i64,
    pub extracted_files: Vec<String>,
}

impl NewModule {
    pub fn into_record(self, id: i64) -> ModuleRecord {
        ModuleRecord {
            id,
            module_name: self.module_name,
            uploaded_time: self.uploaded_time,
            filename: self.filename,
            file_size: self.file_size,
            extracted_files: self.extracted_files,
        }
    }
}
