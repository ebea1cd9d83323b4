//! ZIP inspection and extraction.
//!
//! Everything here is synchronous; callers run it on a blocking thread.

use std::io::{Cursor, ErrorKind};
use std::path::Path;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{CoreError, INVALID_ZIP, Result};

fn corrupt(e: ZipError) -> CoreError {
    CoreError::CorruptArchive(format!("{INVALID_ZIP} {e}"))
}

/// Map a write failure below the extraction directory. Entries that collide
/// with each other (a file where a directory is needed, or the reverse) are
/// the archive's fault, not the server's.
fn write_error(context: &'static str, path: &Path, e: std::io::Error) -> CoreError {
    match e.kind() {
        ErrorKind::AlreadyExists | ErrorKind::NotADirectory | ErrorKind::IsADirectory => {
            CoreError::CorruptArchive(format!(
                "{INVALID_ZIP} entry path {} collides with another entry: {e}",
                path.display()
            ))
        }
        _ => CoreError::io(context, path, e),
    }
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)
}

/// Check that `bytes` is a ZIP container whose entries all stay inside the
/// extraction directory, and return the entry names in archive order.
pub fn inspect(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = open(bytes)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(corrupt)?;
        if entry.enclosed_name().is_none() {
            return Err(CoreError::CorruptArchive(format!(
                "{INVALID_ZIP} entry {:?} escapes the extraction directory",
                entry.name()
            )));
        }
        names.push(entry.name().to_owned());
    }
    Ok(names)
}

/// Extract every entry of `bytes` below `dest` and return the manifest.
///
/// `dest` is created if missing. Read failures inside the archive surface as
/// [`CoreError::CorruptArchive`], write failures as
/// [`CoreError::StorageUnavailable`].
pub fn extract(bytes: &[u8], dest: &Path) -> Result<Vec<String>> {
    let mut archive = open(bytes)?;
    std::fs::create_dir_all(dest)
        .map_err(|e| CoreError::io("failed to create extraction directory", dest, e))?;

    let mut manifest = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(corrupt)?;
        let name = entry.name().to_owned();
        let Some(relative) = entry.enclosed_name() else {
            return Err(CoreError::CorruptArchive(format!(
                "{INVALID_ZIP} entry {name:?} escapes the extraction directory"
            )));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| write_error("failed to create directory", &out_path, e))?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| write_error("failed to create directory", parent, e))?;
            }
            let mut out = std::fs::File::create(&out_path)
                .map_err(|e| write_error("failed to create extracted file", &out_path, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| match e.kind() {
                // Decompression and CRC failures come back as these kinds.
                ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                    CoreError::CorruptArchive(format!("{INVALID_ZIP} entry {name:?}: {e}"))
                }
                _ => CoreError::io("failed to write extracted file", &out_path, e),
            })?;
        }

        manifest.push(name);
    }

    Ok(manifest)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    /// Build an in-memory archive. Names ending in `/` become directory entries.
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::zip_bytes;
    use super::*;

    #[test]
    fn inspect_lists_entries_in_archive_order() {
        let bytes = zip_bytes(&[("z.txt", b"z"), ("a/", b""), ("a/b.txt", b"b")]);
        assert_eq!(inspect(&bytes).unwrap(), vec!["z.txt", "a/", "a/b.txt"]);
    }

    #[test]
    fn inspect_rejects_garbage() {
        let err = inspect(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, CoreError::CorruptArchive(_)));
    }

    #[test]
    fn inspect_rejects_traversal() {
        let bytes = zip_bytes(&[("../evil.txt", b"x")]);
        assert!(matches!(inspect(&bytes), Err(CoreError::CorruptArchive(_))));
    }

    #[test]
    fn extract_writes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let bytes = zip_bytes(&[("readme.txt", b"hello"), ("data/values.csv", b"1,2,3")]);

        let manifest = extract(&bytes, &dest).unwrap();

        assert_eq!(manifest, vec!["readme.txt", "data/values.csv"]);
        assert_eq!(std::fs::read(dest.join("readme.txt")).unwrap(), b"hello");
        assert_eq!(std::fs::read(dest.join("data/values.csv")).unwrap(), b"1,2,3");
    }

    #[test]
    fn extract_rejects_file_used_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let bytes = zip_bytes(&[("a", b"x"), ("a/b.txt", b"y")]);

        let err = extract(&bytes, &dest).unwrap_err();
        assert!(matches!(err, CoreError::CorruptArchive(_)), "{err:?}");
    }

    #[test]
    fn extract_rejects_directory_used_as_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let bytes = zip_bytes(&[("a/b.txt", b"y"), ("a", b"x")]);

        let err = extract(&bytes, &dest).unwrap_err();
        assert!(matches!(err, CoreError::CorruptArchive(_)), "{err:?}");
    }

    #[test]
    fn extract_empty_archive_creates_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        let manifest = extract(&zip_bytes(&[]), &dest).unwrap();
        assert!(manifest.is_empty());
        assert!(dest.is_dir());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }
}
