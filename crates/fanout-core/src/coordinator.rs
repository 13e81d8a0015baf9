//! Dispatch coordinator: the one object worker loops share.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{DispatchError, DispatchEvent, DispatchedTask, RunResult, TaskOutcome, TaskRecord};
use crate::history::HistoryLinker;
use crate::ports::{Clock, EventSink, RunStore};
use crate::queue::PriorityDispatchQueue;
use crate::registry::TaskRegistry;

/// Mutable run state, guarded by the coordinator's single mutex.
struct CoordinatorState {
    run_number: u64,
    registry: Option<TaskRegistry>,
    queue: PriorityDispatchQueue,
    aborted: bool,
}

/// Synchronized entry point for concurrent worker loops.
///
/// Owns the registry, the priority queue and the history linker as one unit.
/// `next_task` and `complete` are the only write paths and both serialize on
/// the internal mutex; critical sections are O(log n) heap operations and
/// never await external work while holding the lock. Records never leave the
/// coordinator mutably — workers get an owned [`DispatchedTask`] view and
/// readers get snapshot clones.
pub struct DispatchCoordinator {
    state: Mutex<CoordinatorState>,
    linker: HistoryLinker,
    store: Arc<dyn RunStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl DispatchCoordinator {
    pub fn new(
        linker: HistoryLinker,
        store: Arc<dyn RunStore>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                run_number: 0,
                registry: None,
                queue: PriorityDispatchQueue::new(),
                aborted: false,
            }),
            linker,
            store,
            events,
            clock,
        }
    }

    /// Parse the manifest, link historical durations, seed the queue, and
    /// persist the in-progress registry.
    ///
    /// Returns the number of tasks read. Fails with
    /// [`DispatchError::NoManifest`] when no bytes were supplied and
    /// [`DispatchError::ManifestFormat`] when they do not parse; either is
    /// fatal to the run and leaves no partial state behind.
    pub async fn ingest(
        &self,
        manifest: Option<&[u8]>,
        run_number: u64,
    ) -> Result<usize, DispatchError> {
        let manifest = match manifest {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(DispatchError::NoManifest),
        };

        let mut registry = TaskRegistry::parse(manifest, run_number)?;
        let linked = self.linker.link_durations(&mut registry, run_number).await?;
        if let Some((prior_run, matched)) = linked {
            self.events.emit(DispatchEvent::HistoryLinked {
                run: run_number,
                prior_run,
                matched,
            });
        }

        let count = registry.len();
        self.store.save(run_number, None, &registry).await?;

        let mut state = self.state.lock().await;
        state.run_number = run_number;
        state.queue = PriorityDispatchQueue::new();
        state.queue.seed(&registry);
        state.registry = Some(registry);
        state.aborted = false;
        drop(state);

        self.events.emit(DispatchEvent::TasksRead {
            run: run_number,
            count,
        });
        Ok(count)
    }

    /// Pop the highest-priority pending task and stamp it as running on
    /// `worker`. `None` means the queue is exhausted — that is the worker
    /// loop's termination signal, not an error.
    pub async fn next_task(&self, worker: usize) -> Option<DispatchedTask> {
        let task = {
            let mut state = self.state.lock().await;
            if state.aborted {
                return None;
            }
            let name = state.queue.pop()?;
            let now = self.clock.now();
            // The queue is seeded from the registry, so the lookup cannot miss.
            let record = state.registry.as_mut().and_then(|r| r.get_mut(&name))?;
            record.start(worker, now);
            record.dispatched_view()
        };

        self.events.emit(DispatchEvent::TaskAllocated {
            task: task.name.clone(),
            worker,
        });
        Some(task)
    }

    /// Record a worker's verdict for `name`.
    ///
    /// Calling this for a task that was never dispatched, or twice for the
    /// same task, is a caller contract violation: the call is ignored and a
    /// [`DispatchEvent::ProtocolViolation`] is emitted.
    pub async fn complete(&self, name: &str, succeeded: bool) {
        let violation = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            match state.registry.as_mut().and_then(|r| r.get_mut(name)) {
                Some(record) if record.outcome() == TaskOutcome::Running => {
                    record.finish(succeeded, now);
                    None
                }
                Some(record) => Some(format!(
                    "complete() for task in state {:?}",
                    record.outcome()
                )),
                None => Some("complete() for unknown task".to_string()),
            }
        };

        match violation {
            None => self.events.emit(DispatchEvent::TaskCompleted {
                task: name.to_string(),
                succeeded,
            }),
            Some(reason) => self.events.emit(DispatchEvent::ProtocolViolation {
                task: name.to_string(),
                reason,
            }),
        }
    }

    /// Mark every still-running task failed because the run was interrupted.
    ///
    /// Idempotent: the second and later calls do nothing. Aborted records
    /// keep no finish timestamp, so the next run's history linking sees no
    /// phantom durations.
    pub async fn abort_all(&self) {
        let (run, aborted) = {
            let mut state = self.state.lock().await;
            if state.aborted {
                return;
            }
            state.aborted = true;
            let mut aborted = 0;
            if let Some(registry) = state.registry.as_mut() {
                for record in registry.iter_mut() {
                    if record.outcome() == TaskOutcome::Running {
                        record.mark_aborted();
                        aborted += 1;
                    }
                }
            }
            (state.run_number, aborted)
        };

        self.events.emit(DispatchEvent::RunAborted { run, aborted });
    }

    /// Number of tasks still waiting in the queue.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Manifest-order listing of all task records, cloned for display.
    pub async fn snapshot(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        state
            .registry
            .as_ref()
            .map(|r| r.list().to_vec())
            .unwrap_or_default()
    }

    /// Aggregate result over the current task set.
    pub async fn aggregate_result(&self) -> RunResult {
        let state = self.state.lock().await;
        match state.registry.as_ref() {
            Some(registry) => RunResult::worst_of(registry.list().iter().map(|r| r.outcome())),
            None => RunResult::Failed,
        }
    }

    /// Write the run's current state through the store.
    pub async fn persist(&self, result: Option<RunResult>) -> Result<(), DispatchError> {
        let (run_number, registry) = {
            let state = self.state.lock().await;
            let Some(registry) = state.registry.as_ref() else {
                return Ok(());
            };
            (state.run_number, registry.clone())
        };
        self.store.save(run_number, result, &registry).await
    }
}
