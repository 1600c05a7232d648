//! Per-unit snapshot files (`unit_snapshot_<unit>.json`).

use super::record::LogRecord;
use crate::error::{CheckpointError, Result};
use crate::persistence::write_json_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All records of one completed unit, written once the unit finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub unit: String,
    pub execution_id: String,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
    pub records: Vec<LogRecord>,
}

impl UnitSnapshot {
    pub fn new(unit: &str, execution_id: &str, records: &[LogRecord]) -> Self {
        Self {
            unit: unit.to_string(),
            execution_id: execution_id.to_string(),
            record_count: records.len(),
            created_at: Utc::now(),
            records: records.to_vec(),
        }
    }

    /// Atomically replace `path` with this snapshot
    pub fn write_to(&self, path: &Path, fsync: bool) -> Result<()> {
        write_json_atomic(path, self, fsync, "write unit snapshot")
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CheckpointError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CheckpointError::persistence("read unit snapshot", path, e)
            }
        })?;
        serde_json::from_slice(&contents).map_err(|e| CheckpointError::Corruption {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_document_shape() {
        let records = vec![json!({"unit": "W1", "title": "Intro"})
            .as_object()
            .cloned()
            .unwrap()];
        let snapshot = UnitSnapshot::new("W1", "cohort_1", &records);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["unit"], json!("W1"));
        assert_eq!(value["executionId"], json!("cohort_1"));
        assert_eq!(value["recordCount"], json!(1));
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["records"][0]["title"], json!("Intro"));
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit_snapshot_w1.json");

        UnitSnapshot::new("W1", "cohort_1", &[]).write_to(&path, false).unwrap();
        let records = vec![LogRecord::new(), LogRecord::new()];
        UnitSnapshot::new("W1", "cohort_1", &records)
            .write_to(&path, false)
            .unwrap();

        let loaded = UnitSnapshot::read_from(&path).unwrap();
        assert_eq!(loaded.record_count, 2);
        assert_eq!(loaded.records.len(), 2);
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            UnitSnapshot::read_from(&dir.path().join("missing.json")),
            Err(CheckpointError::NotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_snapshot_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit_snapshot_w1.json");
        std::fs::write(&path, "{\"unit\": \"W1\", \"records\": [").unwrap();

        match UnitSnapshot::read_from(&path) {
            Err(CheckpointError::Corruption { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected corruption, got {other:?}"),
        }
    }
}
