//! Tolerant JSONL reader.
//!
//! A crash during an append can leave a partial trailing line, and a damaged file
//! can hold garbage lines. Both are skipped and counted; they never fail the read.

use super::record::{strip_write_metadata, LogRecord};
use crate::error::{CheckpointError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

/// Outcome of reading one log file
#[derive(Debug, Default)]
pub struct LogScan {
    /// Valid records in file order, write metadata stripped. Empty in count-only mode.
    pub records: Vec<LogRecord>,
    pub valid_lines: usize,
    pub malformed_lines: usize,
    /// The file does not end with a newline: the last append was interrupted
    pub torn_tail: bool,
}

/// Read every valid record of `path`. A missing file is an empty log.
pub fn read_log(path: &Path) -> Result<LogScan> {
    scan(path, true)
}

/// Count valid lines of `path` without keeping their contents
pub fn count_valid_lines(path: &Path) -> Result<LogScan> {
    scan(path, false)
}

fn scan(path: &Path, keep_records: bool) -> Result<LogScan> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LogScan::default()),
        Err(e) => return Err(CheckpointError::persistence("open log", path, e)),
    };

    let mut reader = BufReader::new(file);
    let mut scan = LogScan::default();
    let mut line = Vec::new();
    let mut line_number = 0usize;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| CheckpointError::persistence("read log", path, e))?;
        if read == 0 {
            break;
        }
        line_number += 1;

        let complete = line.last() == Some(&b'\n');
        if !complete {
            scan.torn_tail = true;
        }

        let trimmed = trim_line(&line);
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_slice::<LogRecord>(trimmed) {
            Ok(mut record) => {
                scan.valid_lines += 1;
                if keep_records {
                    strip_write_metadata(&mut record);
                    scan.records.push(record);
                }
            }
            Err(e) => {
                scan.malformed_lines += 1;
                warn!(
                    path = %path.display(),
                    line = line_number,
                    trailing = !complete,
                    error = %e,
                    "Skipping malformed log line"
                );
            }
        }
    }

    Ok(scan)
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &line[start..end]
}

/// Truncate bytes after the last newline of `path`, left by an interrupted append.
/// Returns the number of bytes removed.
pub fn truncate_torn_tail(path: &Path) -> Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CheckpointError::persistence("open log", path, e)),
    };

    let len = file
        .metadata()
        .map_err(|e| CheckpointError::persistence("inspect log", path, e))?
        .len();
    if len == 0 {
        return Ok(0);
    }

    let keep = last_newline_end(&mut file, len)
        .map_err(|e| CheckpointError::persistence("scan log tail", path, e))?;
    if keep == len {
        return Ok(0);
    }

    file.set_len(keep)
        .map_err(|e| CheckpointError::persistence("truncate log tail", path, e))?;
    file.sync_all()
        .map_err(|e| CheckpointError::persistence("truncate log tail", path, e))?;
    Ok(len - keep)
}

/// Offset just past the last `\n` in the file, or 0 when there is none
fn last_newline_end(file: &mut File, len: u64) -> std::io::Result<u64> {
    const CHUNK: u64 = 8192;
    let mut end = len;
    let mut buf = vec![0u8; CHUNK as usize];

    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let size = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf[..size])?;
        if let Some(pos) = buf[..size].iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}
