// Incremental record log
//
// Extracted records are appended to a per-execution JSONL file as each unit
// finishes, with a snapshot file per unit alongside.

pub mod log;
pub mod reader;
pub mod record;
pub mod snapshot;

pub use log::{IncrementalLog, LogStats};
pub use reader::{count_valid_lines, read_log, LogScan};
pub use record::{content_hash, DedupKey, LogRecord};
pub use snapshot::UnitSnapshot;
