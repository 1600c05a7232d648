//! # File Layout and Wire Constants
//!
//! Names shared by every component that reads or writes a run directory. The
//! on-disk format is consumed by other tools, so these values are part of the
//! external contract.

/// Default file names inside a run directory
pub mod files {
    pub const CHECKPOINT_FILE: &str = "progress.json";
    pub const LOG_FILE_PREFIX: &str = "records_temp_";
    pub const LOG_FILE_EXTENSION: &str = "jsonl";
    pub const SNAPSHOT_FILE_PREFIX: &str = "unit_snapshot_";
    pub const SNAPSHOT_FILE_EXTENSION: &str = "json";
    pub const TEMP_FILE_EXTENSION: &str = "tmp";
}

/// Write metadata attached to every log line and stripped on read
pub mod metadata {
    pub const WRITTEN_AT: &str = "_writtenAt";
    pub const EXECUTION_ID: &str = "_executionId";

    pub const ALL: [&str; 2] = [WRITTEN_AT, EXECUTION_ID];
}

/// Record fields consulted when deduplicating recovered log data
pub mod record_fields {
    pub const DEFAULT_UNIT_FIELD: &str = "unit";
    pub const DEFAULT_HASH_FIELD: &str = "content_hash";
}

/// Format of the timestamp suffix in execution ids (`<run>_<YYYYMMDD_HHMMSS>`)
pub const EXECUTION_ID_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Status string written into `unitDetails[*].status`
pub const UNIT_STATUS_COMPLETED: &str = "completed";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "EXTRACT";
