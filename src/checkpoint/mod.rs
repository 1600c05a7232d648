// Run checkpoint module
//
// Tracks which units of a run are done and the run's lifecycle status, persisted as
// one JSON document per run directory.

pub mod model;
pub mod states;
pub mod store;

pub use model::{ProgressSummary, RunCheckpoint, UnitDetail};
pub use states::RunStatus;
pub use store::CheckpointStore;
