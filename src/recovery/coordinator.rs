//! Detection, reconciliation and reconstruction of interrupted runs.

use super::prompt::RecoveryPrompt;
use super::summary::{RecoverySummary, RecoveryValidation};
use super::RecoveryDecision;
use crate::checkpoint::{CheckpointStore, RunCheckpoint};
use crate::config::RecoveryConfig;
use crate::constants::files;
use crate::error::{CheckpointError, Result};
use crate::journal::{count_valid_lines, read_log, DedupKey, IncrementalLog, LogRecord};
use crate::layout::RunLayout;
use crate::logging::{log_error, log_run_operation};
use crate::persistence::remove_if_exists;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Works on one run directory. Holds no run state between calls.
#[derive(Debug, Clone)]
pub struct RecoveryCoordinator {
    layout: RunLayout,
    config: RecoveryConfig,
}

impl RecoveryCoordinator {
    pub fn new(layout: RunLayout, config: RecoveryConfig) -> Self {
        Self { layout, config }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// A readable checkpoint exists and its run is still `extracting`
    pub fn detect_interrupted(&self) -> bool {
        let interrupted = RunCheckpoint::read_from(&self.layout.checkpoint_path())
            .map(|checkpoint| checkpoint.status.is_recoverable())
            .unwrap_or(false);
        debug!(run_name = %self.layout.run_name(), interrupted, "Checked for interrupted run");
        interrupted
    }

    pub fn load_checkpoint(&self) -> Result<RunCheckpoint> {
        RunCheckpoint::read_from(&self.layout.checkpoint_path()).map_err(|e| match e {
            CheckpointError::NotFound { .. } => CheckpointError::NoCheckpoint {
                run_name: self.layout.run_name().to_string(),
            },
            other => other,
        })
    }

    /// Every valid record of every log file in the run directory, files in name
    /// order. Unreadable files are skipped.
    pub fn load_log_data(&self) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        for path in self.layout.list_log_files()? {
            match read_log(&path) {
                Ok(scan) => {
                    debug!(
                        path = %path.display(),
                        records = scan.records.len(),
                        malformed_lines = scan.malformed_lines,
                        "Loaded record log"
                    );
                    records.extend(scan.records);
                }
                Err(e) => {
                    log_error(
                        "recovery",
                        "load_log_data",
                        &e.to_string(),
                        Some(&path.display().to_string()),
                    );
                }
            }
        }
        Ok(records)
    }

    /// [`load_log_data`](Self::load_log_data) without duplicates
    pub fn merge_log_data(&self) -> Result<Vec<LogRecord>> {
        Ok(self.deduplicate(self.load_log_data()?))
    }

    /// Drop records sharing unit and content hash with an earlier one, keeping the
    /// first occurrence
    pub fn deduplicate(&self, records: Vec<LogRecord>) -> Vec<LogRecord> {
        let loaded = records.len();

        let mut seen = HashSet::new();
        let unique: Vec<LogRecord> = records
            .into_iter()
            .filter(|record| {
                seen.insert(DedupKey::for_record(
                    record,
                    &self.config.unit_field,
                    &self.config.hash_field,
                ))
            })
            .collect();

        if unique.len() < loaded {
            info!(
                run_name = %self.layout.run_name(),
                duplicates = loaded - unique.len(),
                unique = unique.len(),
                "Dropped duplicate records"
            );
        }
        unique
    }

    pub fn recovery_summary(&self) -> RecoverySummary {
        if !self.detect_interrupted() {
            return RecoverySummary::NoInterruption;
        }

        let progress = match self.load_checkpoint() {
            Ok(checkpoint) => checkpoint.summary(),
            Err(e) => {
                return RecoverySummary::Unreadable {
                    message: e.to_string(),
                }
            }
        };

        match self.count_log_records() {
            Ok(log_record_count) => RecoverySummary::Interrupted {
                progress,
                log_record_count,
            },
            Err(e) => RecoverySummary::Unreadable {
                message: e.to_string(),
            },
        }
    }

    fn count_log_records(&self) -> Result<usize> {
        let mut total = 0;
        for path in self.layout.list_log_files()? {
            total += count_valid_lines(&path)?.valid_lines;
        }
        Ok(total)
    }

    /// Summarize the run directory and let `prompt` decide
    pub fn prompt_decision(&self, prompt: &mut dyn RecoveryPrompt) -> RecoveryDecision {
        let summary = self.recovery_summary();
        let decision = prompt.ask_recovery_decision(&summary);
        info!(
            run_name = %self.layout.run_name(),
            decision = %decision,
            "Recovery decision made"
        );
        decision
    }

    /// Checkpoint store and record log of `execution_id`, ready to continue
    pub fn resume_from(&self, execution_id: &str) -> Result<(CheckpointStore, IncrementalLog)> {
        let store = CheckpointStore::from_existing(self.layout.clone(), execution_id)?;
        let log = IncrementalLog::reconstruct_from(self.layout.clone(), execution_id)?;

        log_run_operation(
            "resume",
            self.layout.run_name(),
            execution_id,
            "extracting",
            Some(&format!(
                "{} units pending, {} records in log",
                store.pending_units().len(),
                log.total_written()
            )),
        );
        Ok((store, log))
    }

    /// Delete the checkpoint, every log and every unit snapshot of the run.
    /// Returns the number of files removed.
    pub fn cleanup_all(&self) -> Result<usize> {
        let mut removed = 0;
        if remove_if_exists(&self.layout.checkpoint_path(), "remove checkpoint")? {
            removed += 1;
        }
        removed += self.remove_log_files()?;
        for path in self.layout.list_snapshot_files()? {
            if remove_if_exists(&path, "remove unit snapshot")? {
                removed += 1;
            }
        }

        info!(run_name = %self.layout.run_name(), removed, "Removed all run artifacts");
        Ok(removed)
    }

    /// Delete only the log files of the run
    pub fn cleanup_after_recovery(&self) -> Result<usize> {
        let removed = self.remove_log_files()?;
        info!(run_name = %self.layout.run_name(), removed, "Removed record logs after recovery");
        Ok(removed)
    }

    fn remove_log_files(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.layout.list_log_files()? {
            if remove_if_exists(&path, "remove log")? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cross-check the checkpoint against the merged log data.
    ///
    /// Problems are returned as discrepancies, including failures to read either
    /// side. The log is the more trustworthy source after a crash, so callers
    /// usually log these and carry on.
    pub fn validate_recovery_data(&self) -> RecoveryValidation {
        let mut discrepancies = Vec::new();

        let checkpoint = match self.load_checkpoint() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                return RecoveryValidation::from_discrepancies(vec![format!(
                    "Could not load checkpoint: {e}"
                )])
            }
        };

        discrepancies.extend(checkpoint.invariant_violations());

        match self.merge_log_data() {
            Ok(records) => {
                if records.len() as u64 != checkpoint.records_extracted {
                    discrepancies.push(format!(
                        "Checkpoint reports {} records but the logs hold {}",
                        checkpoint.records_extracted,
                        records.len()
                    ));
                }

                let missing_unit = records
                    .iter()
                    .filter(|record| !record.contains_key(&self.config.unit_field))
                    .count();
                if missing_unit > 0 {
                    discrepancies.push(format!(
                        "{missing_unit} records have no '{}' field",
                        self.config.unit_field
                    ));
                }
            }
            Err(e) => discrepancies.push(format!("Could not load log data: {e}")),
        }

        match self.layout.list_log_files() {
            Ok(paths) => {
                for path in paths {
                    if let Some(found) = self.log_execution_id(&path) {
                        if found != checkpoint.execution_id {
                            discrepancies.push(format!(
                                "Log {} belongs to execution {found}, checkpoint is {}",
                                path.display(),
                                checkpoint.execution_id
                            ));
                        }
                    }
                }
            }
            Err(e) => discrepancies.push(format!("Could not list log files: {e}")),
        }

        let validation = RecoveryValidation::from_discrepancies(discrepancies);
        if !validation.is_valid {
            for discrepancy in &validation.discrepancies {
                warn!(run_name = %self.layout.run_name(), discrepancy = %discrepancy, "Recovery data discrepancy");
            }
        }
        validation
    }

    fn log_execution_id(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let suffix = format!(".{}", files::LOG_FILE_EXTENSION);
        name.strip_prefix(self.layout.storage().log_file_prefix.as_str())?
            .strip_suffix(suffix.as_str())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::RunStatus;
    use crate::config::StorageConfig;
    use crate::recovery::NonInteractivePrompt;
    use serde_json::{json, Value};
    use std::fs;

    const EXECUTION: &str = "cohort_20250101_000000";

    fn layout(dir: &Path) -> RunLayout {
        RunLayout::new(StorageConfig::with_output_dir(dir), "cohort").unwrap()
    }

    fn coordinator(dir: &Path) -> RecoveryCoordinator {
        RecoveryCoordinator::new(layout(dir), RecoveryConfig::default())
    }

    fn record(value: Value) -> LogRecord {
        value.as_object().cloned().unwrap()
    }

    /// Store and log for an execution that finished `W1` with three records
    fn interrupted_run(dir: &Path) -> (CheckpointStore, IncrementalLog) {
        let mut store = CheckpointStore::new(layout(dir), EXECUTION);
        let mut log = IncrementalLog::new(layout(dir), EXECUTION);
        store.initialize(vec!["W1".into(), "W2".into()]).unwrap();

        log.write_batch((0..3).map(|n| record(json!({"unit": "W1", "n": n}))));
        log.flush().unwrap();
        store.mark_unit_completed("W1", 3).unwrap();
        store.save().unwrap();
        (store, log)
    }

    #[test]
    fn test_empty_directory_has_no_interruption() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = coordinator(dir.path());
        assert!(!coordinator.detect_interrupted());
        assert_eq!(coordinator.recovery_summary(), RecoverySummary::NoInterruption);
        assert!(matches!(
            coordinator.load_checkpoint(),
            Err(CheckpointError::NoCheckpoint { .. })
        ));
        assert!(coordinator.load_log_data().unwrap().is_empty());
    }

    #[test]
    fn test_detects_and_summarizes_interrupted_run() {
        let dir = tempfile::tempdir().unwrap();
        interrupted_run(dir.path());
        let coordinator = coordinator(dir.path());

        assert!(coordinator.detect_interrupted());
        match coordinator.recovery_summary() {
            RecoverySummary::Interrupted {
                progress,
                log_record_count,
            } => {
                assert_eq!(progress.units_completed, 1);
                assert_eq!(progress.units_total, 2);
                assert_eq!(progress.last_completed_unit.as_deref(), Some("W1"));
                assert_eq!(log_record_count, 3);
            }
            other => panic!("unexpected summary {other:?}"),
        }
        assert!(coordinator.validate_recovery_data().is_valid);
    }

    #[test]
    fn test_terminal_runs_are_not_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _log) = interrupted_run(dir.path());
        store.mark_failed("network down").unwrap();
        assert!(!coordinator(dir.path()).detect_interrupted());
    }

    #[test]
    fn test_corrupt_checkpoint_is_not_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        layout.ensure_run_dir().unwrap();
        fs::write(layout.checkpoint_path(), "{ not json").unwrap();

        let coordinator = coordinator(dir.path());
        assert!(!coordinator.detect_interrupted());
        assert!(matches!(
            coordinator.load_checkpoint(),
            Err(CheckpointError::Corruption { .. })
        ));
        let validation = coordinator.validate_recovery_data();
        assert!(!validation.is_valid);
        assert!(validation.discrepancies[0].starts_with("Could not load checkpoint"));
    }

    #[test]
    fn test_merge_drops_duplicates_across_logs() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, _log) = interrupted_run(dir.path());

        let mut older = IncrementalLog::new(layout(dir.path()), "cohort_20241231_000000");
        older.write_record(record(json!({"unit": "W1", "n": 0})));
        older.write_record(record(json!({"unit": "W0", "n": 0})));
        older.flush().unwrap();

        let coordinator = coordinator(dir.path());
        let loaded = coordinator.load_log_data().unwrap();
        assert_eq!(loaded.len(), 5);
        // Older execution sorts first
        assert_eq!(loaded[1]["unit"], json!("W0"));

        let merged = coordinator.merge_log_data().unwrap();
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0]["unit"], json!("W1"));
        assert_eq!(merged[1]["unit"], json!("W0"));

        let validation = coordinator.validate_recovery_data();
        assert!(!validation.is_valid);
        assert!(validation
            .discrepancies
            .iter()
            .any(|d| d.contains("belongs to execution cohort_20241231_000000")));
    }

    #[test]
    fn test_validation_reports_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, mut log) = interrupted_run(dir.path());
        log.write_record(record(json!({"unit": "W2", "n": 0})));
        log.flush().unwrap();

        let validation = coordinator(dir.path()).validate_recovery_data();
        assert!(!validation.is_valid);
        assert_eq!(
            validation.discrepancies,
            vec!["Checkpoint reports 3 records but the logs hold 4".to_string()]
        );
    }

    #[test]
    fn test_resume_from_reconstructs_state() {
        let dir = tempfile::tempdir().unwrap();
        interrupted_run(dir.path());
        let coordinator = coordinator(dir.path());

        let (store, log) = coordinator.resume_from(EXECUTION).unwrap();
        assert_eq!(store.status(), Some(RunStatus::Extracting));
        assert_eq!(store.pending_units(), vec!["W2".to_string()]);
        assert_eq!(log.total_written(), 3);

        assert!(matches!(
            coordinator.resume_from("cohort_19990101_000000"),
            Err(CheckpointError::ExecutionMismatch { .. })
        ));
    }

    #[test]
    fn test_prompt_decision_uses_collaborator() {
        let dir = tempfile::tempdir().unwrap();
        interrupted_run(dir.path());
        let mut prompt = NonInteractivePrompt(RecoveryDecision::Abort);
        assert_eq!(
            coordinator(dir.path()).prompt_decision(&mut prompt),
            RecoveryDecision::Abort
        );
    }

    #[test]
    fn test_cleanup_variants() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, mut log) = interrupted_run(dir.path());
        let snapshot = log
            .create_unit_snapshot("W1", &[record(json!({"unit": "W1"}))])
            .unwrap();
        let coordinator = coordinator(dir.path());

        assert_eq!(coordinator.cleanup_after_recovery().unwrap(), 1);
        assert!(!log.log_path().exists());
        assert!(snapshot.exists());
        assert!(coordinator.layout().checkpoint_path().exists());

        assert_eq!(coordinator.cleanup_all().unwrap(), 2);
        assert!(!snapshot.exists());
        assert!(!coordinator.layout().checkpoint_path().exists());
        assert_eq!(coordinator.cleanup_all().unwrap(), 0);
    }
}
