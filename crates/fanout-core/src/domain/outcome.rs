//! Task and run outcomes.

use serde::{Deserialize, Serialize};

/// Outcome of a single task within a run.
///
/// State transitions:
/// - NotRun -> Running -> Succeeded
/// - NotRun -> Running -> Failed
///
/// Never backward. A task that was never dequeued stays NotRun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Still waiting in the dispatch queue.
    NotRun,

    /// Handed to a worker, execution in progress.
    Running,

    /// Worker reported success.
    Succeeded,

    /// Worker reported failure, or the run was aborted mid-execution.
    Failed,
}

impl TaskOutcome {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskOutcome::Succeeded | TaskOutcome::Failed)
    }
}

/// Aggregate result of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    Succeeded,
    Failed,
}

impl RunResult {
    /// Worst-of aggregation over all task outcomes.
    ///
    /// Failed dominates Succeeded. A task left NotRun or Running also fails
    /// the run: that only happens when the run was aborted before the queue
    /// drained, and "succeeded" would be a lie.
    pub fn worst_of(outcomes: impl IntoIterator<Item = TaskOutcome>) -> Self {
        let mut result = RunResult::Succeeded;
        for outcome in outcomes {
            if outcome != TaskOutcome::Succeeded {
                result = RunResult::Failed;
            }
        }
        result
    }
}
