use serde::{Deserialize, Serialize};
use std::fmt;

/// Run status persisted in the checkpoint document.
///
/// `Extracting` is the only live state; `Completed` and `Failed` are terminal and
/// never left once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Units are being extracted; the run can be resumed after an interruption
    Extracting,
    /// Every discovered unit was processed and the log finalized
    Completed,
    /// The run stopped on an unhandled error
    Failed,
}

impl RunStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if an interrupted run in this state can be picked up again
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Extracting)
    }

    /// Whether moving to `next` respects the monotonic lifecycle
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Extracting, Self::Completed) | (Self::Extracting, Self::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extracting => write!(f, "extracting"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extracting" => Ok(Self::Extracting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

/// Default state for new runs
impl Default for RunStatus {
    fn default() -> Self {
        Self::Extracting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_terminal_check() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Extracting.is_terminal());
    }

    #[test]
    fn test_only_extracting_is_recoverable() {
        assert!(RunStatus::Extracting.is_recoverable());
        assert!(!RunStatus::Completed.is_recoverable());
        assert!(!RunStatus::Failed.is_recoverable());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(RunStatus::Extracting.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Extracting.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Extracting));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Extracting.can_transition_to(RunStatus::Extracting));
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(RunStatus::Extracting.to_string(), "extracting");
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("enriching".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&RunStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");

        let parsed: RunStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, RunStatus::Completed);
    }
}
