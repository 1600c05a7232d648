//! Crash-safe file primitives shared by the checkpoint store and the record log.
//!
//! Whole-document writes use the temp-file + fsync + rename pattern: the new content
//! is written to a uniquely named sibling, flushed to disk, then renamed over the
//! target. A reader therefore sees either the previous document or the new one,
//! never a partial write.

use crate::constants::files;
use crate::error::{CheckpointError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Serialize `value` as pretty JSON and atomically replace `target` with it
pub fn write_json_atomic<T: Serialize>(
    target: &Path,
    value: &T,
    fsync: bool,
    operation: &'static str,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(target, &json, fsync, operation)
}

/// Atomically replace `target` with `data`
pub fn write_atomic(target: &Path, data: &[u8], fsync: bool, operation: &'static str) -> Result<()> {
    let temp_path = temp_path_for(target);

    let write_result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        if fsync {
            file.sync_all()?;
        }
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(CheckpointError::persistence(operation, &temp_path, e));
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(CheckpointError::persistence(operation, target, e));
    }

    if fsync {
        sync_parent_dir(target);
    }

    Ok(())
}

/// Remove `path`, treating an already-missing file as success.
/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path, operation: &'static str) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CheckpointError::persistence(operation, path, e)),
    }
}

/// `.<file name>.<uuid>.tmp` next to `target`, so the rename never crosses filesystems
fn temp_path_for(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(
        ".{file_name}.{}.{}",
        Uuid::new_v4().simple(),
        files::TEMP_FILE_EXTENSION
    ))
}

#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    // Persists the rename; best effort
    if let Some(parent) = target.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.json");

        write_json_atomic(&target, &json!({"v": 1}), true, "test write").unwrap();
        write_json_atomic(&target, &json!({"v": 2}), false, "test write").unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(parsed, json!({"v": 2}));

        // no temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_failed_write_reports_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("doc.json");

        let err = write_atomic(&target, b"{}", true, "test write").unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::Persistence {
                operation: "test write",
                ..
            }
        ));
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path, "test remove").unwrap());
        assert!(!remove_if_exists(&path, "test remove").unwrap());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("/runs/a/progress.json"));
        assert_eq!(temp.parent(), Some(Path::new("/runs/a")));
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".progress.json."));
        assert!(name.ends_with(".tmp"));
    }
}
