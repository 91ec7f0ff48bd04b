//! The synchronization engine.
//!
//! - `filter`: which observed requests count as assets
//! - `diff`: add/update/delete plan for one folder
//! - `retry`: bounded attempts for target-scoped work
//! - `scheduler`: bounded-concurrency dispatch with a retry pass
//! - `checkpoint`: resumable cursor over the target list
//! - `target`: one attempt at one target
//! - `orchestrator`: one run end to end
//! - `run`: building the engine from configuration

pub mod checkpoint;
pub mod diff;
pub mod filter;
pub mod orchestrator;
pub mod retry;
pub mod run;
pub mod scheduler;
pub mod target;

pub use checkpoint::CheckpointStore;
pub use diff::{DiffPlan, compute_diff};
pub use filter::AcceptanceFilter;
pub use orchestrator::RunOrchestrator;
pub use retry::{RetryOutcome, RetryPolicy, run_with_retry};
pub use run::build_orchestrator;
pub use scheduler::{ScheduleOutcome, Scheduler, SchedulerConfig, TargetProcessor};
pub use target::TargetSyncer;
