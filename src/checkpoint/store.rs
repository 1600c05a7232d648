//! Durable run-progress store backed by a single JSON document per run.

use super::model::{ProgressSummary, RunCheckpoint, UnitDetail};
use super::states::RunStatus;
use crate::constants::UNIT_STATUS_COMPLETED;
use crate::error::{CheckpointError, Result};
use crate::layout::RunLayout;
use crate::logging::log_run_operation;
use crate::persistence::{remove_if_exists, write_json_atomic};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Owns the [`RunCheckpoint`] of one execution.
///
/// Mutations happen in memory; `initialize`, `mark_completed` and `mark_failed`
/// persist immediately, `mark_unit_completed` waits for an explicit [`save`].
///
/// [`save`]: CheckpointStore::save
#[derive(Debug)]
pub struct CheckpointStore {
    layout: RunLayout,
    execution_id: String,
    checkpoint: Option<RunCheckpoint>,
}

impl CheckpointStore {
    pub fn new(layout: RunLayout, execution_id: impl Into<String>) -> Self {
        Self {
            layout,
            execution_id: execution_id.into(),
            checkpoint: None,
        }
    }

    /// Store loaded from the checkpoint already on disk for `execution_id`
    pub fn from_existing(layout: RunLayout, execution_id: impl Into<String>) -> Result<Self> {
        let mut store = Self::new(layout, execution_id);
        let found = store.load()?.execution_id.clone();
        if found != store.execution_id {
            return Err(CheckpointError::ExecutionMismatch {
                expected: store.execution_id,
                found,
            });
        }
        Ok(store)
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn run_name(&self) -> &str {
        self.layout.run_name()
    }

    pub fn path(&self) -> PathBuf {
        self.layout.checkpoint_path()
    }

    /// In-memory checkpoint, if initialized or loaded
    pub fn checkpoint(&self) -> Option<&RunCheckpoint> {
        self.checkpoint.as_ref()
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.checkpoint.as_ref().map(|c| c.status)
    }

    /// Start a new run over `discovered_units` and persist it
    pub fn initialize(&mut self, discovered_units: Vec<String>) -> Result<()> {
        if self.checkpoint.is_some() {
            return Err(CheckpointError::AlreadyInitialized {
                execution_id: self.execution_id.clone(),
            });
        }

        self.layout.ensure_run_dir()?;
        let checkpoint = RunCheckpoint::new(
            self.layout.run_name(),
            self.execution_id.clone(),
            discovered_units,
            Utc::now(),
        );
        let unit_count = checkpoint.discovered_units.len();
        self.checkpoint = Some(checkpoint);
        self.save()?;

        log_run_operation(
            "initialize",
            self.layout.run_name(),
            &self.execution_id,
            "extracting",
            Some(&format!("{unit_count} units discovered")),
        );
        Ok(())
    }

    /// Record `unit` as done with `record_count` records.
    ///
    /// Returns `false` when the unit was already completed, in which case nothing
    /// changes. Rejected once the run is terminal. In-memory only.
    pub fn mark_unit_completed(&mut self, unit: &str, record_count: u64) -> Result<bool> {
        let execution_id = &self.execution_id;
        let checkpoint = self
            .checkpoint
            .as_mut()
            .ok_or(CheckpointError::NotInitialized {
                operation: "mark_unit_completed",
            })?;

        if checkpoint.status.is_terminal() {
            return Err(CheckpointError::TerminalState {
                execution_id: execution_id.clone(),
                status: checkpoint.status,
                operation: "mark_unit_completed",
            });
        }
        if !checkpoint.is_discovered(unit) {
            return Err(CheckpointError::UnknownUnit {
                unit: unit.to_string(),
                execution_id: execution_id.clone(),
            });
        }
        if checkpoint.is_completed(unit) {
            debug!(unit = %unit, execution_id = %execution_id, "Unit already completed; ignoring");
            return Ok(false);
        }

        let now = Utc::now();
        checkpoint.completed_units.push(unit.to_string());
        checkpoint.records_extracted += record_count;
        checkpoint.last_completed_unit = Some(unit.to_string());
        checkpoint.last_updated = now;
        checkpoint.unit_details.insert(
            unit.to_string(),
            UnitDetail {
                count: record_count,
                timestamp: now,
                status: UNIT_STATUS_COMPLETED.to_string(),
            },
        );
        Ok(true)
    }

    /// Transition to `completed` and persist. No-op from a terminal state.
    pub fn mark_completed(&mut self) -> Result<()> {
        self.transition(RunStatus::Completed, None)
    }

    /// Transition to `failed` with `message` and persist. No-op from a terminal state.
    pub fn mark_failed(&mut self, message: &str) -> Result<()> {
        self.transition(RunStatus::Failed, Some(message))
    }

    fn transition(&mut self, next: RunStatus, message: Option<&str>) -> Result<()> {
        let checkpoint = self
            .checkpoint
            .as_mut()
            .ok_or(CheckpointError::NotInitialized {
                operation: match next {
                    RunStatus::Failed => "mark_failed",
                    _ => "mark_completed",
                },
            })?;

        if !checkpoint.status.can_transition_to(next) {
            debug!(
                execution_id = %self.execution_id,
                current = %checkpoint.status,
                requested = %next,
                "Ignoring transition from terminal state"
            );
            return Ok(());
        }

        let now = Utc::now();
        checkpoint.status = next;
        match next {
            RunStatus::Completed => checkpoint.completed_at = Some(now),
            RunStatus::Failed => {
                checkpoint.failed_at = Some(now);
                checkpoint.error_message = message.map(str::to_string);
            }
            RunStatus::Extracting => {}
        }
        self.save()?;

        log_run_operation(
            "transition",
            self.layout.run_name(),
            &self.execution_id,
            &next.to_string(),
            message,
        );
        Ok(())
    }

    /// Atomically persist the in-memory checkpoint
    pub fn save(&mut self) -> Result<()> {
        let checkpoint = self
            .checkpoint
            .as_mut()
            .ok_or(CheckpointError::NotInitialized { operation: "save" })?;
        checkpoint.last_updated = Utc::now();

        let path = self.layout.checkpoint_path();
        write_json_atomic(&path, &*checkpoint, self.layout.storage().fsync, "save checkpoint")?;

        debug!(
            execution_id = %self.execution_id,
            status = %checkpoint.status,
            completed_units = checkpoint.completed_units.len(),
            records_extracted = checkpoint.records_extracted,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Replace the in-memory state with the document on disk
    pub fn load(&mut self) -> Result<&RunCheckpoint> {
        let checkpoint = RunCheckpoint::read_from(&self.layout.checkpoint_path())?;
        Ok(self.checkpoint.insert(checkpoint))
    }

    /// Checkpoint file exists and parses
    pub fn exists(&self) -> bool {
        RunCheckpoint::read_from(&self.layout.checkpoint_path()).is_ok()
    }

    /// Persisted checkpoint exists, parses and is still `extracting`
    pub fn is_recoverable(&self) -> bool {
        RunCheckpoint::read_from(&self.layout.checkpoint_path())
            .map(|checkpoint| checkpoint.status.is_recoverable())
            .unwrap_or(false)
    }

    /// Delete the checkpoint file if the persisted run completed.
    ///
    /// Failed or unreadable checkpoints are kept for inspection. Returns whether the
    /// file was removed.
    pub fn cleanup(&self) -> Result<bool> {
        let path = self.layout.checkpoint_path();
        match RunCheckpoint::read_from(&path) {
            Ok(checkpoint) if checkpoint.status == RunStatus::Completed => {
                let removed = remove_if_exists(&path, "remove checkpoint")?;
                info!(execution_id = %self.execution_id, "Checkpoint removed after completion");
                Ok(removed)
            }
            Ok(checkpoint) => {
                debug!(status = %checkpoint.status, "Keeping checkpoint of unfinished run");
                Ok(false)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Keeping unreadable checkpoint");
                Ok(false)
            }
        }
    }

    pub fn pending_units(&self) -> Vec<String> {
        self.checkpoint
            .as_ref()
            .map(RunCheckpoint::pending_units)
            .unwrap_or_default()
    }

    pub fn progress_summary(&self) -> Option<ProgressSummary> {
        self.checkpoint.as_ref().map(RunCheckpoint::summary)
    }
}
