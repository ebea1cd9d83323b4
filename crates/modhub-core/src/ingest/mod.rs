//! Module ingestion.
//!
//! [`Ingestor::ingest`] validates an uploaded archive, extracts it and records
//! it in the registry. The work is staged first (raw archive and extraction
//! tree are written under hidden names) and only promoted to the module's
//! final locations once extraction has succeeded. Files already at those
//! locations are set aside rather than deleted; a registry failure after
//! promotion removes the new files and puts the old ones back, so a failed
//! ingestion leaves the registry and the disk as they were.
//!
//! [`Ingestor::remove`] is the inverse: it deletes the row and the files no
//! other record still refers to.

pub mod archive;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::{ModuleRecord, ModuleStore, NewModule};
use crate::error::{CoreError, ONLY_ZIP_ALLOWED, Result};

/// The only content type accepted for uploads.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

const MAX_NAME_LEN: usize = 128;
const STAGING_PREFIX: &str = ".staging-";

/// One upload as received from the client.
#[derive(Debug, Clone)]
pub struct ModuleUpload {
    pub module_name: String,
    pub archive: Bytes,
    pub original_filename: String,
    pub content_type: String,
    /// Replace an existing module with the same name instead of rejecting it.
    pub overwrite: bool,
}

/// Module names currently being ingested.
#[derive(Debug, Default)]
pub struct InFlight {
    names: Mutex<HashSet<String>>,
}

/// Releases its name from [`InFlight`] on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    name: String,
}

impl InFlight {
    /// Claim `name`. Returns `None` if another ingestion holds it.
    pub fn claim(&self, name: &str) -> Option<InFlightGuard<'_>> {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if !names.insert(name.to_owned()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self,
            name: name.to_owned(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

/// Runs the ingestion workflow against a [`ModuleStore`].
#[derive(Debug)]
pub struct Ingestor<S> {
    store: Arc<S>,
    upload_dir: PathBuf,
    modules_dir: PathBuf,
    max_upload_bytes: usize,
    in_flight: InFlight,
}

impl<S: ModuleStore> Ingestor<S> {
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self {
            store,
            upload_dir: config.upload_dir.clone(),
            modules_dir: config.modules_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            in_flight: InFlight::default(),
        }
    }

    /// Directory holding the extracted files of `module_name`.
    pub fn module_dir(&self, module_name: &str) -> PathBuf {
        self.modules_dir.join(module_name)
    }

    /// Location of a stored raw archive.
    pub fn archive_path(&self, filename: &str) -> PathBuf {
        self.upload_dir.join(filename)
    }

    /// Validate, store, extract and register one upload.
    pub async fn ingest(&self, upload: ModuleUpload) -> Result<ModuleRecord> {
        if upload.content_type.trim() != ZIP_CONTENT_TYPE {
            return Err(CoreError::InvalidInput(ONLY_ZIP_ALLOWED.to_owned()));
        }
        let module_name = validate_segment("module name", upload.module_name.trim())?;
        let filename = base_name(&upload.original_filename)?;
        if upload.archive.len() > self.max_upload_bytes {
            return Err(CoreError::InvalidInput(format!(
                "archive is {} bytes, the limit is {} bytes",
                upload.archive.len(),
                self.max_upload_bytes
            )));
        }

        let _guard = self.in_flight.claim(&module_name).ok_or_else(|| {
            CoreError::Conflict(format!("module {module_name} is already being uploaded"))
        })?;

        let target = Target {
            dir: self.module_dir(&module_name),
            raw: self.archive_path(&filename),
        };
        if !upload.overwrite
            && (self.store.module_name_exists(&module_name).await? || path_exists(&target.dir).await)
        {
            return Err(CoreError::Conflict(format!("module {module_name} already exists")));
        }

        // Reject non-archives before anything touches the disk.
        let payload = upload.archive;
        let inspected = {
            let bytes = payload.clone();
            tokio::task::spawn_blocking(move || archive::inspect(&bytes)).await??
        };
        debug!(module_name = %module_name, entries = inspected.len(), "archive inspected");

        let replaced_archives = if upload.overwrite {
            self.archives_of(&module_name).await?
        } else {
            Vec::new()
        };

        let staging = Staging::new(&self.upload_dir, &self.modules_dir);
        let (file_size, manifest) = match staging.fill(payload).await {
            Ok(staged) => staged,
            Err(e) => {
                staging.discard().await;
                return Err(e);
            }
        };
        let promoted = match staging.promote(target).await {
            Ok(promoted) => promoted,
            Err(e) => {
                staging.discard().await;
                return Err(e);
            }
        };

        let module = NewModule {
            module_name: module_name.clone(),
            uploaded_time: Utc::now(),
            filename,
            file_size,
            extracted_files: manifest,
        };
        let inserted = if upload.overwrite {
            self.store.replace_module(module.clone()).await
        } else {
            self.store.insert_module(module.clone()).await
        };

        match inserted {
            Ok(id) => {
                promoted.commit().await;
                info!(
                    id,
                    module_name = %module.module_name,
                    filename = %module.filename,
                    file_size,
                    entries = module.extracted_files.len(),
                    "module ingested"
                );
                for previous in replaced_archives {
                    if previous != module.filename
                        && matches!(self.store.filename_in_use(&previous).await, Ok(false))
                    {
                        remove_quietly(&self.archive_path(&previous)).await;
                    }
                }
                Ok(module.into_record(id))
            }
            Err(e) => {
                warn!(module_name = %module_name, error = %e, "registry insert failed; restoring previous files");
                promoted.rollback().await;
                Err(e.into())
            }
        }
    }

    /// Raw archive filenames recorded for `module_name`.
    async fn archives_of(&self, module_name: &str) -> Result<Vec<String>> {
        let modules = self.store.list_modules().await?;
        Ok(modules
            .into_iter()
            .filter(|m| m.module_name == module_name)
            .map(|m| m.filename)
            .collect())
    }

    /// Delete the record `id` and any files no remaining record refers to.
    pub async fn remove(&self, id: i64) -> Result<ModuleRecord> {
        let record = self
            .store
            .get_module(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("module {id} not found")))?;
        if !self.store.delete_module(id).await? {
            return Err(CoreError::NotFound(format!("module {id} not found")));
        }

        if !self.store.module_name_exists(&record.module_name).await? {
            remove_quietly(&self.module_dir(&record.module_name)).await;
        }
        if !self.store.filename_in_use(&record.filename).await? {
            remove_quietly(&self.archive_path(&record.filename)).await;
        }

        info!(id, module_name = %record.module_name, "module deleted");
        Ok(record)
    }
}

/// Final locations of an ingested module.
#[derive(Debug)]
struct Target {
    dir: PathBuf,
    raw: PathBuf,
}

/// Hidden scratch locations one ingestion writes into before promotion.
///
/// Whatever already sits at the target paths is moved aside into the
/// `backup_*` locations during promotion, never deleted before the registry
/// write has committed.
#[derive(Debug)]
struct Staging {
    upload_dir: PathBuf,
    modules_dir: PathBuf,
    raw: PathBuf,
    dir: PathBuf,
    backup_raw: PathBuf,
    backup_dir: PathBuf,
}

impl Staging {
    fn new(upload_dir: &Path, modules_dir: &Path) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self {
            upload_dir: upload_dir.to_path_buf(),
            modules_dir: modules_dir.to_path_buf(),
            raw: upload_dir.join(format!("{STAGING_PREFIX}{token}.zip")),
            dir: modules_dir.join(format!("{STAGING_PREFIX}{token}")),
            backup_raw: upload_dir.join(format!("{STAGING_PREFIX}{token}-old.zip")),
            backup_dir: modules_dir.join(format!("{STAGING_PREFIX}{token}-old")),
        }
    }

    /// Write the raw archive and extract it. Returns `(file_size, manifest)`.
    async fn fill(&self, payload: Bytes) -> Result<(i64, Vec<String>)> {
        for dir in [&self.upload_dir, &self.modules_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CoreError::io("failed to create storage directory", dir, e))?;
        }

        tokio::fs::write(&self.raw, &payload)
            .await
            .map_err(|e| CoreError::io("failed to store archive", &self.raw, e))?;
        let file_size = tokio::fs::metadata(&self.raw)
            .await
            .map_err(|e| CoreError::io("failed to stat stored archive", &self.raw, e))?
            .len();

        let dest = self.dir.clone();
        let manifest =
            tokio::task::spawn_blocking(move || archive::extract(&payload, &dest)).await??;

        Ok((i64::try_from(file_size).unwrap_or(i64::MAX), manifest))
    }

    /// Move the staged files to `target`, setting aside what was there.
    ///
    /// On error every path is back where it started and only the staged
    /// files remain for [`Staging::discard`].
    async fn promote(&self, target: Target) -> Result<Promoted> {
        let old_dir = set_aside(&target.dir, &self.backup_dir).await?;
        if let Err(e) = tokio::fs::rename(&self.dir, &target.dir).await {
            if old_dir {
                put_back(&self.backup_dir, &target.dir).await;
            }
            return Err(CoreError::io("failed to move extracted module into place", &target.dir, e));
        }

        let old_raw = match set_aside(&target.raw, &self.backup_raw).await {
            Ok(old_raw) => old_raw,
            Err(e) => {
                undo_move(&target.dir, &self.dir, old_dir.then_some(&self.backup_dir)).await;
                return Err(e);
            }
        };
        if let Err(e) = tokio::fs::rename(&self.raw, &target.raw).await {
            if old_raw {
                put_back(&self.backup_raw, &target.raw).await;
            }
            undo_move(&target.dir, &self.dir, old_dir.then_some(&self.backup_dir)).await;
            return Err(CoreError::io("failed to move archive into place", &target.raw, e));
        }

        Ok(Promoted {
            target,
            backup_dir: old_dir.then(|| self.backup_dir.clone()),
            backup_raw: old_raw.then(|| self.backup_raw.clone()),
        })
    }

    async fn discard(&self) {
        remove_quietly(&self.dir).await;
        remove_quietly(&self.raw).await;
    }
}

/// Files in their final place, with whatever they displaced kept aside
/// until the registry write settles.
#[derive(Debug)]
struct Promoted {
    target: Target,
    backup_dir: Option<PathBuf>,
    backup_raw: Option<PathBuf>,
}

impl Promoted {
    /// The registry now refers to the new files; drop the displaced ones.
    async fn commit(self) {
        for backup in [self.backup_dir, self.backup_raw].into_iter().flatten() {
            remove_quietly(&backup).await;
        }
    }

    /// The registry write failed; remove the new files and restore the old.
    async fn rollback(self) {
        remove_quietly(&self.target.dir).await;
        if let Some(backup) = &self.backup_dir {
            put_back(backup, &self.target.dir).await;
        }
        remove_quietly(&self.target.raw).await;
        if let Some(backup) = &self.backup_raw {
            put_back(backup, &self.target.raw).await;
        }
    }
}

/// Rename `path` to `backup` if it exists. Returns whether anything moved.
async fn set_aside(path: &Path, backup: &Path) -> Result<bool> {
    if !path_exists(path).await {
        return Ok(false);
    }
    tokio::fs::rename(path, backup)
        .await
        .map_err(|e| CoreError::io("failed to set aside previous module files", path, e))?;
    Ok(true)
}

/// Rename `backup` back to `path`, logging on failure.
async fn put_back(backup: &Path, path: &Path) {
    if let Err(e) = tokio::fs::rename(backup, path).await {
        warn!(
            backup = %backup.display(),
            path = %path.display(),
            error = %e,
            "failed to restore previous module files"
        );
    }
}

/// Return a promoted directory to staging and restore what it displaced.
async fn undo_move(promoted: &Path, staged: &Path, backup: Option<&PathBuf>) {
    put_back(promoted, staged).await;
    if let Some(backup) = backup {
        put_back(backup, promoted).await;
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Remove a file or directory tree, logging anything but "already gone".
async fn remove_quietly(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove module files"),
    }
}

/// Accept `raw` as a single directory-entry name.
fn validate_segment(what: &str, raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(CoreError::InvalidInput(format!("{what} must not be empty")));
    }
    if raw.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::InvalidInput(format!(
            "{what} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if raw.starts_with('.') || raw.contains(['/', '\\', '\0']) || raw.chars().any(char::is_control) {
        return Err(CoreError::InvalidInput(format!("{what} {raw:?} is not allowed")));
    }
    Ok(raw.to_owned())
}

/// Reduce a client-supplied filename to its last path component.
fn base_name(raw: &str) -> Result<String> {
    let last = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    validate_segment("filename", last)
}
