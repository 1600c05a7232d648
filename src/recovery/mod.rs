//! # Recovery
//!
//! Detects a run that stopped while still `extracting`, summarizes what it left
//! behind, asks the operator what to do and rebuilds the checkpoint store and record
//! log so the run can continue where it stopped.
//!
//! The coordinator owns no run state itself. It reads the run directory, hands back
//! reconstructed [`CheckpointStore`](crate::checkpoint::CheckpointStore) and
//! [`IncrementalLog`](crate::journal::IncrementalLog) instances, and deletes files
//! only when asked to.

pub mod coordinator;
pub mod prompt;
pub mod summary;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use coordinator::RecoveryCoordinator;
pub use prompt::{ConsolePrompt, NonInteractivePrompt, RecoveryPrompt};
pub use summary::{RecoverySummary, RecoveryValidation};

/// Operator choice when an interrupted run is found. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryDecision {
    /// Resume from the first unit not yet completed
    Continue,
    /// Delete every artifact of the run and start over
    Restart,
    /// Stop without touching anything
    Abort,
}

impl fmt::Display for RecoveryDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Restart => write!(f, "restart"),
            Self::Abort => write!(f, "abort"),
        }
    }
}
