use std::future::Future;

use chrono::{DateTime, Utc};

use crate::entities::{ModuleRecord, NewModule, SqliteStore};

/// The module registry: a single flat table, no update operation.
pub trait ModuleStore: Send + Sync + 'static {
    /// Append a row and return the identifier assigned to it.
    fn insert_module(
        &self,
        module: NewModule,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Delete every row named `module.module_name` and insert `module`, atomically.
    fn replace_module(
        &self,
        module: NewModule,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// All rows in insertion order.
    fn list_modules(&self) -> impl Future<Output = Result<Vec<ModuleRecord>, sqlx::Error>> + Send;

    fn get_module(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<ModuleRecord>, sqlx::Error>> + Send;

    /// Returns `true` when a row was removed.
    fn delete_module(&self, id: i64) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn module_name_exists(
        &self,
        module_name: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn filename_in_use(
        &self,
        filename: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

type ModuleRow = (i64, String, String, String, i64, Option<String>);

const LIST_MODULES: &str = "SELECT id, module_name, uploaded_time, filename, file_size, extracted_files \
     FROM modules ORDER BY id ASC";

const GET_MODULE: &str = "SELECT id, module_name, uploaded_time, filename, file_size, extracted_files \
     FROM modules WHERE id = ?1";

/// Serialise a manifest for the `extracted_files` column.
pub fn encode_manifest(entries: &[String]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_owned())
}

/// Split a stored manifest back into entry names.
///
/// Accepts the JSON array written by [`encode_manifest`] as well as the
/// comma-delimited form found in databases created before manifests were
/// stored as JSON.
pub fn decode_manifest(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Vec::new();
    };
    if raw.starts_with('[') {
        if let Ok(entries) = serde_json::from_str::<Vec<String>>(raw) {
            return entries;
        }
    }
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_uploaded_time(id: i64, raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    raw.parse().map_err(|e: chrono::ParseError| {
        tracing::warn!(id, raw = %raw, error = %e, "stored uploaded_time is not RFC 3339");
        sqlx::Error::Decode(Box::new(e))
    })
}

fn from_row(
    (id, module_name, uploaded_time, filename, file_size, extracted_files): ModuleRow,
) -> Result<ModuleRecord, sqlx::Error> {
    Ok(ModuleRecord {
        id,
        module_name,
        uploaded_time: parse_uploaded_time(id, &uploaded_time)?,
        filename,
        file_size,
        extracted_files: decode_manifest(extracted_files.as_deref()),
    })
}

const INSERT_MODULE: &str = "INSERT INTO modules \
     (module_name, uploaded_time, filename, file_size, extracted_files) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

impl ModuleStore for SqliteStore {
    async fn insert_module(&self, module: NewModule) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(INSERT_MODULE)
            .bind(&module.module_name)
            .bind(module.uploaded_time.to_rfc3339())
            .bind(&module.filename)
            .bind(module.file_size)
            .bind(encode_manifest(&module.extracted_files))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn replace_module(&self, module: NewModule) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM modules WHERE module_name = ?1")
            .bind(&module.module_name)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let result = sqlx::query(INSERT_MODULE)
            .bind(&module.module_name)
            .bind(module.uploaded_time.to_rfc3339())
            .bind(&module.filename)
            .bind(module.file_size)
            .bind(encode_manifest(&module.extracted_files))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(module_name = %module.module_name, removed, "replaced module rows");
        Ok(result.last_insert_rowid())
    }

    async fn list_modules(&self) -> Result<Vec<ModuleRecord>, sqlx::Error> {
        let rows: Vec<ModuleRow> = sqlx::query_as(LIST_MODULES)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn get_module(&self, id: i64) -> Result<Option<ModuleRecord>, sqlx::Error> {
        let row: Option<ModuleRow> = sqlx::query_as(GET_MODULE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(from_row).transpose()
    }

    async fn delete_module(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM modules WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn module_name_exists(&self, module_name: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM modules WHERE module_name = ?1 LIMIT 1")
                .bind(module_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn filename_in_use(&self, filename: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM modules WHERE filename = ?1 LIMIT 1")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
