#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Resumable Extract
//!
//! Crash-safe progress tracking for long-running extraction jobs that fetch records
//! unit by unit from a slow, unreliable source.
//!
//! ## Overview
//!
//! A run is split into units (weeks, pages, partitions). As each unit finishes its
//! records are appended to a write-ahead log and the unit is recorded in a checkpoint
//! document. If the process dies, the next start finds the interrupted run, asks the
//! operator whether to continue, restart or abort, and resumes with the first unit
//! that was not completed. Completed units are never extracted twice and flushed
//! records are never lost.
//!
//! ## Module Organization
//!
//! - [`checkpoint`] - Run checkpoint document, status machine and its store
//! - [`journal`] - Append-only JSONL record log and per-unit snapshots
//! - [`recovery`] - Interrupted-run detection, operator prompt and reconstruction
//! - [`runner`] - Orchestrates a whole run over a [`runner::UnitExtractor`]
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`layout`] - File naming inside a run directory
//! - [`persistence`] - Atomic file replacement
//! - [`logging`] - `tracing` subscriber setup and structured event helpers
//! - [`error`] - Structured error handling
//!
//! ## Run Directory
//!
//! ```text
//! <output_dir>/<run_name>/
//!   progress.json                       checkpoint document
//!   records_temp_<execution_id>.jsonl   record log, one JSON object per line
//!   unit_snapshot_<unit>.json           records of one completed unit
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use resumable_extract::config::ConfigLoader;
//! use resumable_extract::journal::LogRecord;
//! use resumable_extract::runner::{ExtractionRunner, RunOutcome, UnitExtractor};
//!
//! struct Weeks;
//!
//! #[async_trait]
//! impl UnitExtractor for Weeks {
//!     async fn discover_units(&self) -> anyhow::Result<Vec<String>> {
//!         Ok(vec!["Week 1".into(), "Week 2".into()])
//!     }
//!
//!     async fn extract_unit(&self, unit: &str) -> anyhow::Result<Vec<LogRecord>> {
//!         let mut record = LogRecord::new();
//!         record.insert("unit".into(), unit.into());
//!         Ok(vec![record])
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load(None)?;
//! resumable_extract::logging::init_structured_logging(&config.logging);
//!
//! let runner = ExtractionRunner::new(config.storage, config.recovery, "cohort-2025", Weeks)?;
//! if let RunOutcome::Completed { records, .. } = runner.run_with_configured_prompt().await? {
//!     println!("extracted {} records", records.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod error;
pub mod journal;
pub mod layout;
pub mod logging;
pub mod persistence;
pub mod recovery;
pub mod runner;

pub use checkpoint::{CheckpointStore, ProgressSummary, RunCheckpoint, RunStatus, UnitDetail};
pub use config::{ConfigLoader, ExtractorConfig, RecoveryConfig, StorageConfig};
pub use error::{CheckpointError, Result};
pub use journal::{IncrementalLog, LogRecord, LogStats, UnitSnapshot};
pub use layout::RunLayout;
pub use recovery::{
    ConsolePrompt, NonInteractivePrompt, RecoveryCoordinator, RecoveryDecision, RecoveryPrompt,
    RecoverySummary, RecoveryValidation,
};
pub use runner::{ExtractionRunner, RunError, RunOutcome, UnitExtractor};
