//! Indexing runs and their scheduling.

mod coordinator;
mod pipeline;
mod scheduler;

pub use coordinator::{JobCoordinator, RunGuard};
pub use pipeline::{IndexPipeline, RunOutcome, RunReport};
pub use scheduler::{Scheduler, SchedulerHandle, WorkerStats};
