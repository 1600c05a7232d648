//! The persisted run checkpoint document (`progress.json`).

use super::states::RunStatus;
use crate::error::{CheckpointError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Progress of one run attempt.
///
/// Invariants maintained by [`super::CheckpointStore`]:
/// `completed_units ⊆ discovered_units`, and `records_extracted` equals the sum of
/// `unit_details[u].count` over the completed units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCheckpoint {
    pub run_name: String,
    pub execution_id: String,
    pub status: RunStatus,
    pub discovered_units: Vec<String>,
    pub completed_units: Vec<String>,
    pub records_extracted: u64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub unit_details: BTreeMap<String, UnitDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDetail {
    pub count: u64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

/// Operator-facing view of a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub run_name: String,
    pub execution_id: String,
    pub status: RunStatus,
    pub units_total: usize,
    pub units_completed: usize,
    pub units_pending: usize,
    pub records_extracted: u64,
    pub last_updated: DateTime<Utc>,
    pub last_completed_unit: Option<String>,
}

impl RunCheckpoint {
    /// A fresh checkpoint in `extracting` state. Duplicate unit ids keep their first
    /// position.
    pub fn new(
        run_name: impl Into<String>,
        execution_id: impl Into<String>,
        discovered_units: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut seen = HashSet::new();
        let discovered_units = discovered_units
            .into_iter()
            .filter(|unit| seen.insert(unit.clone()))
            .collect();

        Self {
            run_name: run_name.into(),
            execution_id: execution_id.into(),
            status: RunStatus::Extracting,
            discovered_units,
            completed_units: Vec::new(),
            records_extracted: 0,
            last_updated: now,
            created_at: now,
            unit_details: BTreeMap::new(),
            last_completed_unit: None,
            completed_at: None,
            failed_at: None,
            error_message: None,
        }
    }

    /// Read and parse a checkpoint document.
    ///
    /// A missing file is `NotFound`; anything that is not a checkpoint document is
    /// `Corruption`. No repair is attempted.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(CheckpointError::Corruption {
                    path: path.to_path_buf(),
                    reason: format!("not valid UTF-8: {e}"),
                })
            }
            Err(e) => return Err(CheckpointError::persistence("read checkpoint", path, e)),
        };

        serde_json::from_str(&contents).map_err(|e| CheckpointError::Corruption {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn is_completed(&self, unit: &str) -> bool {
        self.completed_units.iter().any(|u| u == unit)
    }

    pub fn is_discovered(&self, unit: &str) -> bool {
        self.discovered_units.iter().any(|u| u == unit)
    }

    /// Discovered units not yet completed, in discovery order
    pub fn pending_units(&self) -> Vec<String> {
        let completed: HashSet<&str> = self.completed_units.iter().map(String::as_str).collect();
        self.discovered_units
            .iter()
            .filter(|unit| !completed.contains(unit.as_str()))
            .cloned()
            .collect()
    }

    /// Sum of per-unit counts over the completed units
    pub fn detail_record_total(&self) -> u64 {
        self.completed_units
            .iter()
            .filter_map(|unit| self.unit_details.get(unit))
            .map(|detail| detail.count)
            .sum()
    }

    /// Human-readable descriptions of every broken document invariant
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for unit in &self.completed_units {
            if !self.is_discovered(unit) {
                violations.push(format!(
                    "completed unit '{unit}' is not among the discovered units"
                ));
            }
            if !self.unit_details.contains_key(unit) {
                violations.push(format!("completed unit '{unit}' has no unit details"));
            }
        }

        let detail_total = self.detail_record_total();
        if detail_total != self.records_extracted {
            violations.push(format!(
                "recordsExtracted is {} but unit details sum to {detail_total}",
                self.records_extracted
            ));
        }

        violations
    }

    pub fn summary(&self) -> ProgressSummary {
        let units_total = self.discovered_units.len();
        let units_completed = self.completed_units.len();
        ProgressSummary {
            run_name: self.run_name.clone(),
            execution_id: self.execution_id.clone(),
            status: self.status,
            units_total,
            units_completed,
            units_pending: units_total.saturating_sub(units_completed),
            records_extracted: self.records_extracted,
            last_updated: self.last_updated,
            last_completed_unit: self.last_completed_unit.clone(),
        }
    }
}
