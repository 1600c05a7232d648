//! What the coordinator reports about a run directory.

use crate::checkpoint::ProgressSummary;
use serde::Serialize;
use std::fmt;

/// State of a run directory as shown to the operator before deciding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoverySummary {
    /// No checkpoint, or the last run already finished
    NoInterruption,
    /// A run stopped while still extracting
    Interrupted {
        progress: ProgressSummary,
        /// Valid records found across every log file of the run
        log_record_count: usize,
    },
    /// A checkpoint or log exists but could not be read
    Unreadable { message: String },
}

impl RecoverySummary {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

impl fmt::Display for RecoverySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInterruption => write!(f, "No interrupted run found"),
            Self::Interrupted {
                progress,
                log_record_count,
            } => {
                writeln!(f, "Interrupted run detected: {}", progress.execution_id)?;
                writeln!(
                    f,
                    "  Progress:      {}/{} units",
                    progress.units_completed, progress.units_total
                )?;
                writeln!(
                    f,
                    "  Records:       {} checkpointed, {} in logs",
                    progress.records_extracted, log_record_count
                )?;
                if let Some(unit) = &progress.last_completed_unit {
                    writeln!(f, "  Last unit:     {unit}")?;
                }
                writeln!(f, "  Last updated:  {}", progress.last_updated.to_rfc3339())?;
                write!(f, "  Status:        {}", progress.status)
            }
            Self::Unreadable { message } => write!(f, "Run state is unreadable: {message}"),
        }
    }
}

/// Result of cross-checking the checkpoint against the record logs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RecoveryValidation {
    pub is_valid: bool,
    /// One human-readable line per problem found
    pub discrepancies: Vec<String>,
}

impl RecoveryValidation {
    pub fn from_discrepancies(discrepancies: Vec<String>) -> Self {
        Self {
            is_valid: discrepancies.is_empty(),
            discrepancies,
        }
    }
}
