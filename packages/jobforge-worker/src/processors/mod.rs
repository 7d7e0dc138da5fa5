//! The three processors (spec §4.7-§4.9), one per `TaskKind` family, plus the
//! shared outcome type the dispatcher acts on.

pub mod company;
pub mod job_listing;
pub mod merge;
pub mod source;

use jobforge_core::error::{Categorizable, ErrorCategory};
use jobforge_core::task::Task;

use crate::deps::Deps;
use jobforge_core::config::ConfigSnapshot;

/// What a processor did with its task, reported back to the dispatcher
/// instead of the processor calling `TaskStore` terminal methods itself.
/// Keeping this one layer removed lets the dispatcher be the single place
/// that decides retry vs. terminal vs. already-handled (spec §4.1).
#[derive(Debug)]
pub enum ProcessOutcome {
    Success,
    Filtered(String),
    Skipped(String),
    Failed { details: String, category: ErrorCategory },
    /// The processor already drove the task to a terminal state itself
    /// (currently only `requeue_self`, which marks the original task
    /// Success-by-requeue). The dispatcher must not touch task status again.
    AlreadyTerminal,
}

impl ProcessOutcome {
    pub fn failed<E: Categorizable + ToString>(err: E) -> Self {
        let category = err.category();
        let details = err.to_string();
        ProcessOutcome::Failed { details, category }
    }
}

/// Bundle passed to every processor entry point: the claimed task, the
/// current config snapshot, and the shared dependency set.
pub struct ProcessCtx<'a> {
    pub task: &'a Task,
    pub config: &'a ConfigSnapshot,
    pub deps: &'a Deps,
    pub worker_id: &'a str,
}
