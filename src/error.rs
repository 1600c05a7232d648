//! Error types for checkpoint, log and recovery operations.
//!
//! Anything that threatens durability (I/O failures, an unparsable checkpoint) is an
//! error. Bookkeeping mismatches between the checkpoint and the log are reported as
//! data by the validation methods instead.

use crate::checkpoint::RunStatus;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    /// A store method that needs run state was called before `initialize`/`load`.
    #[error("Checkpoint not initialized: call initialize() or load() before {operation}")]
    NotInitialized { operation: &'static str },

    #[error("Checkpoint already initialized for execution {execution_id}")]
    AlreadyInitialized { execution_id: String },

    /// Mutation attempted after the run reached `completed` or `failed`.
    #[error("Run {execution_id} is {status}; {operation} is not allowed in a terminal state")]
    TerminalState {
        execution_id: String,
        status: RunStatus,
        operation: &'static str,
    },

    #[error("Unit '{unit}' is not among the discovered units of execution {execution_id}")]
    UnknownUnit { unit: String, execution_id: String },

    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("No checkpoint found for run '{run_name}'")]
    NoCheckpoint { run_name: String },

    /// A checkpoint or snapshot file exists but does not parse.
    #[error("Corrupted document at {path}: {reason}")]
    Corruption { path: PathBuf, reason: String },

    #[error("Invalid run name '{run_name}': {reason}")]
    InvalidRunName { run_name: String, reason: String },

    #[error("Checkpoint belongs to execution {found}, expected {expected}")]
    ExecutionMismatch { expected: String, found: String },

    #[error("Persistence error during {operation} on {path}: {source}")]
    Persistence {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckpointError {
    pub(crate) fn persistence(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        CheckpointError::Persistence {
            operation,
            path: path.into(),
            source,
        }
    }

    /// True for errors that only mean "nothing persisted yet".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CheckpointError::NotFound { .. } | CheckpointError::NoCheckpoint { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
