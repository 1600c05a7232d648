//! Crash and resume scenarios driven through the public store, log and coordinator
//! APIs, one process lifetime per block.

mod common;

use common::*;
use resumable_extract::checkpoint::{CheckpointStore, RunStatus};
use resumable_extract::error::CheckpointError;
use resumable_extract::journal::IncrementalLog;
use resumable_extract::recovery::{RecoveryCoordinator, RecoverySummary};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;

const EXECUTION: &str = "cohort_20250301_101500";

#[test]
fn test_two_unit_run_survives_crash_and_completes() {
    let dir = tempfile::tempdir().unwrap();

    // First process: W1 done, then crash before completion
    {
        let mut store = CheckpointStore::new(layout(dir.path()), EXECUTION);
        let mut log = IncrementalLog::new(layout(dir.path()), EXECUTION);
        store.initialize(units(&["W1", "W2"])).unwrap();

        log.write_batch(unit_records("W1", 3));
        log.flush().unwrap();
        store.mark_unit_completed("W1", 3).unwrap();
        store.save().unwrap();
    }

    // Second process
    let coordinator = RecoveryCoordinator::new(layout(dir.path()), recovery_config());
    assert!(coordinator.detect_interrupted());
    let checkpoint = coordinator.load_checkpoint().unwrap();
    assert_eq!(checkpoint.completed_units, units(&["W1"]));
    assert_eq!(coordinator.load_log_data().unwrap().len(), 3);

    let (mut store, mut log) = coordinator.resume_from(&checkpoint.execution_id).unwrap();
    assert_eq!(store.pending_units(), units(&["W2"]));

    log.write_batch(unit_records("W2", 2));
    log.flush().unwrap();
    store.mark_unit_completed("W2", 2).unwrap();
    store.save().unwrap();
    store.mark_completed().unwrap();

    let records = log.finalize().unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["unit"], json!("W1"));
    assert_eq!(records[4]["unit"], json!("W2"));
    assert!(log.validate_integrity());

    assert!(store.cleanup().unwrap());
    assert!(!layout(dir.path()).checkpoint_path().exists());
    assert!(!coordinator.detect_interrupted());
}

#[test]
fn test_resume_positions_log_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = CheckpointStore::new(layout(dir.path()), EXECUTION);
        let mut log = IncrementalLog::new(layout(dir.path()), EXECUTION);
        store.initialize(units(&["A", "B", "C"])).unwrap();
        for (unit, count) in [("A", 3usize), ("B", 2)] {
            log.write_batch(unit_records(unit, count));
            log.flush().unwrap();
            store.mark_unit_completed(unit, count as u64).unwrap();
            store.save().unwrap();
        }
    }

    let coordinator = RecoveryCoordinator::new(layout(dir.path()), recovery_config());
    let (store, log) = coordinator.resume_from(EXECUTION).unwrap();
    assert_eq!(log.total_written(), 5);
    assert_eq!(store.pending_units(), units(&["C"]));

    let summary = store.progress_summary().unwrap();
    assert_eq!(summary.units_completed, 2);
    assert_eq!(summary.units_pending, 1);
    assert_eq!(summary.records_extracted, 5);
    assert_eq!(summary.last_completed_unit.as_deref(), Some("B"));
}

#[test]
fn test_crash_mid_flush_leaves_unit_pending_and_log_readable() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = CheckpointStore::new(layout(dir.path()), EXECUTION);
        let mut log = IncrementalLog::new(layout(dir.path()), EXECUTION);
        store.initialize(units(&["W1", "W2"])).unwrap();
        log.write_batch(unit_records("W1", 2));
        log.flush().unwrap();
        store.mark_unit_completed("W1", 2).unwrap();
        store.save().unwrap();

        // W2's append was cut short
        let mut file = OpenOptions::new().append(true).open(log.log_path()).unwrap();
        file.write_all(b"{\"unit\":\"W2\",\"title\":\"W2 ca").unwrap();
    }

    let coordinator = RecoveryCoordinator::new(layout(dir.path()), recovery_config());
    match coordinator.recovery_summary() {
        RecoverySummary::Interrupted {
            log_record_count, ..
        } => assert_eq!(log_record_count, 2),
        other => panic!("unexpected summary {other:?}"),
    }
    assert!(coordinator.validate_recovery_data().is_valid);

    let (mut store, mut log) = coordinator.resume_from(EXECUTION).unwrap();
    assert_eq!(store.pending_units(), units(&["W2"]));
    assert_eq!(log.total_written(), 2);

    log.write_batch(unit_records("W2", 1));
    log.flush().unwrap();
    store.mark_unit_completed("W2", 1).unwrap();
    store.mark_completed().unwrap();

    let records = log.finalize().unwrap();
    assert_eq!(records.len(), 3);
    assert!(log.validate_integrity());
}

#[test]
fn test_reextracted_unit_is_deduplicated_on_merge() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = CheckpointStore::new(layout(dir.path()), EXECUTION);
        let mut log = IncrementalLog::new(layout(dir.path()), EXECUTION);
        store.initialize(units(&["W1", "W2"])).unwrap();
        log.write_batch(unit_records("W1", 2));
        log.flush().unwrap();
        store.mark_unit_completed("W1", 2).unwrap();
        store.save().unwrap();

        // W2 flushed but the checkpoint save never happened
        log.write_batch(unit_records("W2", 2));
        log.flush().unwrap();
    }

    let coordinator = RecoveryCoordinator::new(layout(dir.path()), recovery_config());
    let validation = coordinator.validate_recovery_data();
    assert!(!validation.is_valid);
    assert_eq!(validation.discrepancies.len(), 1);

    let (mut store, mut log) = coordinator.resume_from(EXECUTION).unwrap();
    assert_eq!(store.pending_units(), units(&["W2"]));
    log.write_batch(unit_records("W2", 2));
    log.flush().unwrap();
    store.mark_unit_completed("W2", 2).unwrap();
    store.save().unwrap();

    assert_eq!(coordinator.load_log_data().unwrap().len(), 6);
    let merged = coordinator.merge_log_data().unwrap();
    assert_eq!(merged.len(), 4);
    assert!(coordinator.validate_recovery_data().is_valid);
}

#[test]
fn test_records_with_stored_hash_deduplicate_by_hash() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = IncrementalLog::new(layout(dir.path()), EXECUTION);
    log.write_record(record(json!({"unit": "W1", "content_hash": "h1", "title": "first"})));
    log.write_record(record(json!({"unit": "W1", "content_hash": "h1", "title": "edited"})));
    log.write_record(record(json!({"unit": "W2", "content_hash": "h1", "title": "first"})));
    log.flush().unwrap();

    let coordinator = RecoveryCoordinator::new(layout(dir.path()), recovery_config());
    let merged = coordinator.merge_log_data().unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0]["title"], json!("first"));
    assert_eq!(merged[1]["unit"], json!("W2"));
}

#[test]
fn test_completed_run_is_immutable() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CheckpointStore::new(layout(dir.path()), EXECUTION);
    store.initialize(units(&["W1", "W2"])).unwrap();
    store.mark_unit_completed("W1", 1).unwrap();
    store.mark_completed().unwrap();

    assert!(!store.is_recoverable());
    assert!(matches!(
        store.mark_unit_completed("W2", 1),
        Err(CheckpointError::TerminalState {
            status: RunStatus::Completed,
            ..
        })
    ));
    store.mark_failed("late failure").unwrap();
    assert_eq!(store.status(), Some(RunStatus::Completed));

    let coordinator = RecoveryCoordinator::new(layout(dir.path()), recovery_config());
    assert_eq!(coordinator.recovery_summary(), RecoverySummary::NoInterruption);
}
