//! Append-only record log of one execution.

use super::reader::{count_valid_lines, read_log, truncate_torn_tail};
use super::record::{with_write_metadata, LogRecord};
use super::snapshot::UnitSnapshot;
use crate::error::{CheckpointError, Result};
use crate::layout::RunLayout;
use crate::logging::log_unit_operation;
use crate::persistence::remove_if_exists;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Buffered JSONL writer for `records_temp_<execution_id>.jsonl`.
///
/// Records are stamped with write metadata and held in memory until [`flush`], which
/// appends them to the log and syncs the file. The log is the authoritative copy of
/// extracted data; unit snapshots are a convenience view.
///
/// One writer per execution. Nothing prevents a second process from appending to
/// the same file.
///
/// [`flush`]: IncrementalLog::flush
#[derive(Debug)]
pub struct IncrementalLog {
    layout: RunLayout,
    execution_id: String,
    buffer: Vec<LogRecord>,
    total_written: usize,
    snapshots: BTreeMap<String, PathBuf>,
}

/// Counters and paths of an [`IncrementalLog`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub run_name: String,
    pub execution_id: String,
    pub total_written: usize,
    pub buffered: usize,
    pub log_path: PathBuf,
    pub snapshot_paths: Vec<PathBuf>,
}

impl IncrementalLog {
    pub fn new(layout: RunLayout, execution_id: impl Into<String>) -> Self {
        Self {
            layout,
            execution_id: execution_id.into(),
            buffer: Vec::new(),
            total_written: 0,
            snapshots: BTreeMap::new(),
        }
    }

    /// Reopen the log of an interrupted execution.
    ///
    /// Bytes left after the last newline by an interrupted flush are cut off, then
    /// `total_written` is set to the number of valid lines. Record contents are not
    /// kept in memory.
    pub fn reconstruct_from(layout: RunLayout, execution_id: impl Into<String>) -> Result<Self> {
        let mut log = Self::new(layout, execution_id);
        let path = log.log_path();

        let removed = truncate_torn_tail(&path)?;
        if removed > 0 {
            warn!(
                path = %path.display(),
                bytes = removed,
                "Truncated partial trailing line left by an interrupted flush"
            );
        }

        let scan = count_valid_lines(&path)?;
        log.total_written = scan.valid_lines;
        if scan.malformed_lines > 0 {
            warn!(
                path = %path.display(),
                malformed_lines = scan.malformed_lines,
                "Log contains malformed lines; they are ignored"
            );
        }

        info!(
            execution_id = %log.execution_id,
            total_written = log.total_written,
            "Reconstructed record log"
        );
        Ok(log)
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn log_path(&self) -> PathBuf {
        self.layout.log_path(&self.execution_id)
    }

    /// Records durably appended so far
    pub fn total_written(&self) -> usize {
        self.total_written
    }

    /// Records waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn write_record(&mut self, record: LogRecord) {
        let stamped = with_write_metadata(record, &self.execution_id, Utc::now());
        self.buffer.push(stamped);
    }

    pub fn write_batch(&mut self, records: impl IntoIterator<Item = LogRecord>) {
        let now = Utc::now();
        let execution_id = &self.execution_id;
        self.buffer.extend(
            records
                .into_iter()
                .map(|record| with_write_metadata(record, execution_id, now)),
        );
    }

    /// Append the buffered records to the log and sync it.
    ///
    /// Returns the number of records appended. The buffer is kept when the write
    /// fails so the caller may retry.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let mut payload = Vec::new();
        for record in &self.buffer {
            serde_json::to_writer(&mut payload, record)?;
            payload.push(b'\n');
        }

        self.layout.ensure_run_dir()?;
        let path = self.log_path();
        let fsync = self.layout.storage().fsync;
        let append = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(&payload)?;
            if fsync {
                file.sync_data()?;
            }
            Ok(())
        };
        append().map_err(|e| CheckpointError::persistence("flush log", &path, e))?;

        let flushed = self.buffer.len();
        self.buffer.clear();
        self.total_written += flushed;
        debug!(
            execution_id = %self.execution_id,
            flushed = flushed,
            total_written = self.total_written,
            "Flushed record log"
        );
        Ok(flushed)
    }

    /// Write `records` as the snapshot of `unit`, replacing any earlier one
    pub fn create_unit_snapshot(&mut self, unit: &str, records: &[LogRecord]) -> Result<PathBuf> {
        self.layout.ensure_run_dir()?;
        let path = self.layout.snapshot_path(unit);
        UnitSnapshot::new(unit, &self.execution_id, records)
            .write_to(&path, self.layout.storage().fsync)?;

        log_unit_operation(
            "snapshot",
            &self.execution_id,
            unit,
            Some(records.len()),
            "written",
        );
        self.snapshots.insert(unit.to_string(), path.clone());
        Ok(path)
    }

    /// Flush, then return every record in the log in write order with metadata
    /// stripped. Safe to call more than once.
    pub fn finalize(&mut self) -> Result<Vec<LogRecord>> {
        self.flush()?;
        let scan = read_log(&self.log_path())?;
        info!(
            execution_id = %self.execution_id,
            records = scan.records.len(),
            malformed_lines = scan.malformed_lines,
            "Finalized record log"
        );
        Ok(scan.records)
    }

    /// Whether the number of valid lines on disk matches `total_written`.
    /// Read failures count as a mismatch.
    pub fn validate_integrity(&self) -> bool {
        let path = self.log_path();
        match count_valid_lines(&path) {
            Ok(scan) if scan.valid_lines == self.total_written => true,
            Ok(scan) => {
                warn!(
                    path = %path.display(),
                    expected = self.total_written,
                    found = scan.valid_lines,
                    "Record log line count does not match records written"
                );
                false
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not verify record log");
                false
            }
        }
    }

    /// Delete the log file. Snapshots stay.
    pub fn cleanup(&self) -> Result<bool> {
        let path = self.log_path();
        let removed = remove_if_exists(&path, "remove log")?;
        if removed {
            info!(path = %path.display(), "Removed record log");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> LogStats {
        LogStats {
            run_name: self.layout.run_name().to_string(),
            execution_id: self.execution_id.clone(),
            total_written: self.total_written,
            buffered: self.buffer.len(),
            log_path: self.log_path(),
            snapshot_paths: self.snapshots.values().cloned().collect(),
        }
    }
}
