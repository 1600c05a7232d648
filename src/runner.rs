//! # Extraction Runner
//!
//! Drives one run end to end: recover or start, extract every pending unit, commit
//! each unit to the record log and the checkpoint, then finalize and clean up.
//!
//! Per unit the order is fixed: append records to the log and flush, write the unit
//! snapshot, mark the unit completed and save the checkpoint. A crash anywhere in
//! that sequence leaves the unit pending, so it is extracted again on resume. Records
//! it appended before the crash stay in the log and are returned alongside the new
//! ones; [`RecoveryCoordinator::merge_log_data`] collapses them when content
//! duplicates are not wanted.
//!
//! Only the extractor is async. Checkpoint and log calls are blocking file I/O.

use crate::checkpoint::CheckpointStore;
use crate::config::{RecoveryConfig, StorageConfig};
use crate::error::{self, CheckpointError};
use crate::journal::{IncrementalLog, LogRecord};
use crate::layout::RunLayout;
use crate::logging::{log_error, log_run_operation, log_unit_operation};
use crate::recovery::{
    ConsolePrompt, NonInteractivePrompt, RecoveryCoordinator, RecoveryDecision, RecoveryPrompt,
};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

/// Source of units and their records
#[async_trait]
pub trait UnitExtractor: Send + Sync {
    /// All units of the run, in processing order
    async fn discover_units(&self) -> anyhow::Result<Vec<String>>;

    /// Every record of `unit`
    async fn extract_unit(&self, unit: &str) -> anyhow::Result<Vec<LogRecord>>;
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Unit discovery failed: {0}")]
    Discovery(#[source] anyhow::Error),

    #[error("Extraction of unit '{unit}' failed: {source}")]
    Extraction {
        unit: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        execution_id: String,
        /// Every record of the execution in write order
        records: Vec<LogRecord>,
        /// The run continued an interrupted execution
        resumed: bool,
    },
    /// The operator chose to abort; nothing on disk was changed
    Aborted,
}

pub struct ExtractionRunner<E> {
    layout: RunLayout,
    recovery: RecoveryConfig,
    extractor: E,
}

impl<E: UnitExtractor> ExtractionRunner<E> {
    /// Fails with [`CheckpointError::InvalidRunName`] when `run_name` is not a plain
    /// directory name
    pub fn new(
        storage: StorageConfig,
        recovery: RecoveryConfig,
        run_name: impl Into<String>,
        extractor: E,
    ) -> error::Result<Self> {
        Ok(Self {
            layout: RunLayout::new(storage, run_name)?,
            recovery,
            extractor,
        })
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn coordinator(&self) -> RecoveryCoordinator {
        RecoveryCoordinator::new(self.layout.clone(), self.recovery.clone())
    }

    /// Run with the console prompt, or the configured default decision when
    /// `recovery.interactive` is off
    pub async fn run_with_configured_prompt(&self) -> Result<RunOutcome, RunError> {
        if self.recovery.interactive {
            self.run(&mut ConsolePrompt::stdio()).await
        } else {
            self.run(&mut NonInteractivePrompt(self.recovery.default_decision))
                .await
        }
    }

    pub async fn run(&self, prompt: &mut dyn RecoveryPrompt) -> Result<RunOutcome, RunError> {
        let coordinator = self.coordinator();

        let (mut store, mut log, resumed) = if coordinator.detect_interrupted() {
            match coordinator.prompt_decision(prompt) {
                RecoveryDecision::Abort => {
                    log_run_operation(
                        "abort",
                        self.layout.run_name(),
                        "-",
                        "aborted",
                        Some("operator aborted recovery"),
                    );
                    return Ok(RunOutcome::Aborted);
                }
                RecoveryDecision::Restart => {
                    coordinator.cleanup_all()?;
                    let (store, log) = self.start_fresh().await?;
                    (store, log, false)
                }
                RecoveryDecision::Continue => {
                    let checkpoint = coordinator.load_checkpoint()?;
                    let validation = coordinator.validate_recovery_data();
                    if !validation.is_valid {
                        warn!(
                            run_name = %self.layout.run_name(),
                            discrepancies = validation.discrepancies.len(),
                            "Resuming despite recovery data discrepancies"
                        );
                    }
                    let (store, log) = coordinator.resume_from(&checkpoint.execution_id)?;
                    (store, log, true)
                }
            }
        } else {
            let (store, log) = self.start_fresh().await?;
            (store, log, false)
        };

        match self.process(&coordinator, &mut store, &mut log, resumed).await {
            Ok(records) => Ok(RunOutcome::Completed {
                execution_id: store.execution_id().to_string(),
                records,
                resumed,
            }),
            Err(e) => {
                if let Err(mark_error) = store.mark_failed(&e.to_string()) {
                    log_error(
                        "runner",
                        "mark_failed",
                        &mark_error.to_string(),
                        Some(store.execution_id()),
                    );
                }
                Err(e)
            }
        }
    }

    async fn start_fresh(&self) -> Result<(CheckpointStore, IncrementalLog), RunError> {
        let layout = self.layout.clone();
        let execution_id = layout.unused_execution_id(Utc::now());

        let units = self
            .extractor
            .discover_units()
            .await
            .map_err(RunError::Discovery)?;

        let mut store = CheckpointStore::new(layout.clone(), execution_id.clone());
        store.initialize(units)?;
        Ok((store, IncrementalLog::new(layout, execution_id)))
    }

    async fn process(
        &self,
        coordinator: &RecoveryCoordinator,
        store: &mut CheckpointStore,
        log: &mut IncrementalLog,
        resumed: bool,
    ) -> Result<Vec<LogRecord>, RunError> {
        let pending = store.pending_units();
        info!(
            run_name = %self.layout.run_name(),
            execution_id = %store.execution_id(),
            pending = pending.len(),
            resumed,
            "Processing units"
        );

        for unit in pending {
            let records = self
                .extractor
                .extract_unit(&unit)
                .await
                .map_err(|source| RunError::Extraction {
                    unit: unit.clone(),
                    source,
                })?;

            log.write_batch(records.iter().cloned());
            log.flush()?;
            log.create_unit_snapshot(&unit, &records)?;
            store.mark_unit_completed(&unit, records.len() as u64)?;
            store.save()?;

            log_unit_operation(
                "extract",
                store.execution_id(),
                &unit,
                Some(records.len()),
                "completed",
            );
        }

        store.mark_completed()?;
        let records = log.finalize()?;
        if !log.validate_integrity() {
            warn!(
                execution_id = %store.execution_id(),
                "Record log failed its integrity check; returning what could be read"
            );
        }

        store.cleanup()?;
        log.cleanup()?;
        if resumed {
            coordinator.cleanup_after_recovery()?;
        }

        log_run_operation(
            "complete",
            self.layout.run_name(),
            store.execution_id(),
            "completed",
            Some(&format!("{} records", records.len())),
        );
        Ok(records)
    }
}
