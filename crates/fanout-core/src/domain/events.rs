//! Observability events emitted by the coordinator.

/// A structured event describing something the dispatch engine did.
///
/// Events go through the injected [`EventSink`](crate::ports::EventSink);
/// the engine has no other side channel. The default sink renders them as
/// log lines ("read 4 tasks", "allocating Task1 to worker 0", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Manifest ingested; `count` tasks entered the registry.
    TasksRead { run: u64, count: usize },

    /// Historical durations copied from a comparable prior run.
    HistoryLinked {
        run: u64,
        prior_run: u64,
        matched: usize,
    },

    /// A task was popped from the queue and handed to a worker slot.
    TaskAllocated { task: String, worker: usize },

    /// A worker reported the task done.
    TaskCompleted { task: String, succeeded: bool },

    /// The run was interrupted; `aborted` running tasks were marked failed.
    RunAborted { run: u64, aborted: usize },

    /// A caller broke the dispatch contract (e.g. double `complete`).
    /// The offending call was ignored.
    ProtocolViolation { task: String, reason: String },
}
