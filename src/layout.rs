//! Per-run directory layout.
//!
//! Every run name owns `<output_dir>/<run_name>/`, holding the checkpoint document,
//! one JSONL log per execution and one snapshot file per completed unit.

use crate::config::StorageConfig;
use crate::constants::{files, EXECUTION_ID_TIMESTAMP_FORMAT};
use crate::error::{CheckpointError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunLayout {
    run_name: String,
    run_dir: PathBuf,
    storage: StorageConfig,
}

impl RunLayout {
    /// Layout for `run_name` under `storage.output_dir`. The name must be a single
    /// plain path component.
    pub fn new(storage: StorageConfig, run_name: impl Into<String>) -> Result<Self> {
        let run_name = run_name.into();
        validate_run_name(&run_name)?;
        let run_dir = storage.output_dir.join(&run_name);
        Ok(Self {
            run_name,
            run_dir,
            storage,
        })
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.run_dir.join(&self.storage.checkpoint_file)
    }

    pub fn log_path(&self, execution_id: &str) -> PathBuf {
        self.run_dir.join(format!(
            "{}{execution_id}.{}",
            self.storage.log_file_prefix,
            files::LOG_FILE_EXTENSION
        ))
    }

    pub fn snapshot_path(&self, unit: &str) -> PathBuf {
        self.run_dir.join(format!(
            "{}{}.{}",
            self.storage.snapshot_file_prefix,
            unit_file_slug(unit),
            files::SNAPSHOT_FILE_EXTENSION
        ))
    }

    /// Build the execution id for a new attempt of this run
    pub fn new_execution_id(&self, started_at: DateTime<Utc>) -> String {
        format!(
            "{}_{}",
            self.run_name,
            started_at.format(EXECUTION_ID_TIMESTAMP_FORMAT)
        )
    }

    /// Like [`new_execution_id`](Self::new_execution_id), but never names an
    /// execution that already has a log file. Attempts started within the same
    /// second get a `_2`, `_3`, ... suffix.
    pub fn unused_execution_id(&self, started_at: DateTime<Utc>) -> String {
        let base = self.new_execution_id(started_at);
        let mut candidate = base.clone();
        let mut attempt = 1;
        while self.log_path(&candidate).exists() {
            attempt += 1;
            candidate = format!("{base}_{attempt}");
        }
        candidate
    }

    pub fn ensure_run_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.run_dir)
            .map_err(|e| CheckpointError::persistence("create run directory", &self.run_dir, e))
    }

    /// All log files in the run directory, sorted by file name
    pub fn list_log_files(&self) -> Result<Vec<PathBuf>> {
        self.list_matching(&self.storage.log_file_prefix, files::LOG_FILE_EXTENSION)
    }

    /// All unit snapshot files in the run directory, sorted by file name
    pub fn list_snapshot_files(&self) -> Result<Vec<PathBuf>> {
        self.list_matching(
            &self.storage.snapshot_file_prefix,
            files::SNAPSHOT_FILE_EXTENSION,
        )
    }

    fn list_matching(&self, prefix: &str, extension: &str) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.run_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CheckpointError::persistence(
                    "list run directory",
                    &self.run_dir,
                    e,
                ))
            }
        };

        let suffix = format!(".{extension}");
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| CheckpointError::persistence("list run directory", &self.run_dir, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(prefix) && name.ends_with(&suffix) && entry.path().is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn validate_run_name(run_name: &str) -> Result<()> {
    let invalid = |reason: &str| CheckpointError::InvalidRunName {
        run_name: run_name.to_string(),
        reason: reason.to_string(),
    };

    if run_name.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if run_name.contains(['/', '\\']) || Path::new(run_name).is_absolute() {
        return Err(invalid("must not contain path separators"));
    }
    if run_name == "." || run_name == ".." {
        return Err(invalid("must not be a relative directory reference"));
    }
    Ok(())
}

/// File-name-safe form of a unit id: lower case, whitespace and separators as `_`
pub fn unit_file_slug(unit: &str) -> String {
    let slug: String = unit
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_whitespace() => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();

    match slug.as_str() {
        "" | "." | ".." => "_".repeat(slug.len().max(1)),
        _ => slug,
    }
}
