//! Run orchestrator: provisions worker slots and drives a run to completion.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::coordinator::DispatchCoordinator;
use crate::domain::{DispatchError, RunResult, TaskOutcome, TaskRecord};
use crate::ports::TaskExecutor;

/// Where a run currently is. Published on a watch channel so callers can
/// observe progress without polling the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Ingesting,
    Dispatching,
    Draining,
    Complete,
}

/// What a finished run hands back: the aggregate verdict and the full
/// per-task breakdown in manifest order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: RunResult,
    pub tasks: Vec<TaskRecord>,
}

/// Outer control loop for one run.
///
/// Spawns exactly `workers` loops, each independently pulling from the
/// coordinator until the queue is exhausted, then waits for every loop to
/// return (a sibling may still be mid-execution of the last popped task
/// while the others already observed an empty queue).
pub struct RunOrchestrator {
    coordinator: Arc<DispatchCoordinator>,
    executor: Arc<dyn TaskExecutor>,
    workers: usize,
    stage_tx: watch::Sender<RunStage>,
}

impl RunOrchestrator {
    pub fn new(
        coordinator: Arc<DispatchCoordinator>,
        executor: Arc<dyn TaskExecutor>,
        workers: usize,
    ) -> Self {
        let (stage_tx, _) = watch::channel(RunStage::Idle);
        Self {
            coordinator,
            executor,
            workers: workers.max(1),
            stage_tx,
        }
    }

    /// Subscribe to stage transitions.
    pub fn stage(&self) -> watch::Receiver<RunStage> {
        self.stage_tx.subscribe()
    }

    /// Execute one run to completion.
    ///
    /// `interrupt` is the external stop signal: flipping it to `true` makes
    /// worker loops stop pulling new tasks, abandons in-flight executions at
    /// the next await point, and funnels everything into one `abort_all`.
    ///
    /// A missing or malformed manifest is fatal and returns the error before
    /// any worker is dispatched. Individual task failures are not errors;
    /// they surface in the report's aggregate result.
    pub async fn run(
        &self,
        manifest: Option<&[u8]>,
        run_number: u64,
        interrupt: watch::Receiver<bool>,
    ) -> Result<RunReport, DispatchError> {
        self.stage_tx.send_replace(RunStage::Ingesting);
        if let Err(e) = self.coordinator.ingest(manifest, run_number).await {
            self.stage_tx.send_replace(RunStage::Complete);
            return Err(e);
        }

        self.stage_tx.send_replace(RunStage::Dispatching);
        let mut joins: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let coordinator = Arc::clone(&self.coordinator);
            let executor = Arc::clone(&self.executor);
            let mut interrupt = interrupt.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, coordinator, executor, &mut interrupt).await;
            }));
        }

        // Dispatching lasts while the queue still has pending work; the
        // remaining wait is for stragglers mid-execution of their last task.
        // Every worker loop being gone also ends the stage, or a panicked
        // pool would leave the run waiting on work nobody will pull.
        loop {
            if self.coordinator.pending_count().await == 0
                || *interrupt.borrow()
                || joins.iter().all(|j| j.is_finished())
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        self.stage_tx.send_replace(RunStage::Draining);
        for join in joins {
            // A worker loop panicking must not wedge the run; the tasks it
            // held are swept by the abort below.
            let _ = join.await;
        }

        // Interrupts and panicked workers both leave Running records behind.
        // Sweep them so the persisted state is terminal and a later run's
        // history linking never sees a phantom in-flight duration.
        let orphaned = self
            .coordinator
            .snapshot()
            .await
            .iter()
            .any(|t| t.outcome() == TaskOutcome::Running);
        if *interrupt.borrow() || orphaned {
            self.coordinator.abort_all().await;
        }

        let result = self.coordinator.aggregate_result().await;
        self.coordinator.persist(Some(result)).await?;
        let tasks = self.coordinator.snapshot().await;
        self.stage_tx.send_replace(RunStage::Complete);

        Ok(RunReport { result, tasks })
    }
}

/// One worker slot: ask for a task, run it, report, repeat.
///
/// Interruption is checked before every pull and raced against the executor
/// while it runs; an abandoned execution leaves its record Running for
/// `abort_all` to sweep up.
async fn worker_loop(
    worker_id: usize,
    coordinator: Arc<DispatchCoordinator>,
    executor: Arc<dyn TaskExecutor>,
    interrupt: &mut watch::Receiver<bool>,
) {
    loop {
        if *interrupt.borrow() {
            break;
        }

        let Some(task) = coordinator.next_task(worker_id).await else {
            break;
        };

        let succeeded = tokio::select! {
            _ = interrupt.changed() => break,
            succeeded = executor.execute(&task, worker_id) => succeeded,
        };

        coordinator.complete(&task.name, succeeded).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use crate::domain::DispatchedTask;
    use crate::history::HistoryLinker;
    use crate::impls::InMemoryRunStore;
    use crate::ports::{FixedClock, MemoryEventSink};

    /// Scripted executor: records who ran what, fails listed tasks, and can
    /// hold each execution for a while.
    struct ScriptedExecutor {
        fail: HashSet<String>,
        delay: Duration,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedExecutor {
        fn new() -> Self {
            Self {
                fail: HashSet::new(),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(names: &[&str]) -> Self {
            let mut s = Self::new();
            s.fail = names.iter().map(|n| n.to_string()).collect();
            s
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn seen(&self) -> Vec<(String, usize)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskExecutor for ScriptedExecutor {
        async fn execute(&self, task: &DispatchedTask, worker: usize) -> bool {
            self.seen.lock().unwrap().push((task.name.clone(), worker));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            !self.fail.contains(&task.name)
        }
    }

    /// Executor that panics on listed tasks, simulating a worker loop dying.
    struct PanickingExecutor {
        panic_on: HashSet<String>,
    }

    impl PanickingExecutor {
        fn new(names: &[&str]) -> Self {
            Self {
                panic_on: names.iter().map(|n| n.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for PanickingExecutor {
        async fn execute(&self, task: &DispatchedTask, _worker: usize) -> bool {
            if self.panic_on.contains(&task.name) {
                panic!("executor blew up on {}", task.name);
            }
            true
        }
    }

    fn wired(
        store: Arc<InMemoryRunStore>,
        executor: Arc<dyn TaskExecutor>,
        workers: usize,
    ) -> RunOrchestrator {
        let clock = Arc::new(FixedClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));
        let coordinator = Arc::new(DispatchCoordinator::new(
            HistoryLinker::new(store.clone()),
            store.clone(),
            Arc::new(MemoryEventSink::new()),
            clock,
        ));
        RunOrchestrator::new(coordinator, executor, workers)
    }

    fn harness(executor: ScriptedExecutor, workers: usize) -> (RunOrchestrator, Arc<ScriptedExecutor>, Arc<InMemoryRunStore>) {
        let store = Arc::new(InMemoryRunStore::new());
        let executor = Arc::new(executor);
        (
            wired(store.clone(), executor.clone(), workers),
            executor,
            store,
        )
    }

    fn no_interrupt() -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        // Keep the sender alive for the test's duration.
        std::mem::forget(tx);
        rx
    }

    const TWO_TASKS: &[u8] = br#"[{"name":"Task1","env":{}},{"name":"Task2","env":{}}]"#;
    const THREE_TASKS: &[u8] =
        br#"[{"name":"a","env":{}},{"name":"b","env":{}},{"name":"c","env":{}}]"#;

    #[tokio::test]
    async fn two_tasks_two_workers_all_succeed() {
        let (orchestrator, executor, _) = harness(ScriptedExecutor::new(), 2);

        let report = orchestrator
            .run(Some(TWO_TASKS), 1, no_interrupt())
            .await
            .unwrap();

        assert_eq!(report.result, RunResult::Succeeded);
        assert_eq!(report.tasks.len(), 2);
        assert!(report
            .tasks
            .iter()
            .all(|t| t.outcome() == TaskOutcome::Succeeded));

        let names: HashSet<_> = executor.seen().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 2);
        assert_eq!(*orchestrator.stage().borrow(), RunStage::Complete);
    }

    #[tokio::test]
    async fn one_failure_among_three_fails_the_run_but_not_the_siblings() {
        let (orchestrator, executor, _) = harness(ScriptedExecutor::failing(&["b"]), 2);

        let report = orchestrator
            .run(Some(THREE_TASKS), 1, no_interrupt())
            .await
            .unwrap();

        assert_eq!(report.result, RunResult::Failed);
        // Every task was dispatched and reached a terminal state.
        assert_eq!(executor.seen().len(), 3);
        assert!(report.tasks.iter().all(|t| t.outcome().is_terminal()));
        let failed: Vec<_> = report
            .tasks
            .iter()
            .filter(|t| t.outcome() == TaskOutcome::Failed)
            .map(|t| t.name())
            .collect();
        assert_eq!(failed, ["b"]);
    }

    #[tokio::test]
    async fn missing_manifest_fails_before_dispatch() {
        let (orchestrator, executor, _) = harness(ScriptedExecutor::new(), 2);

        let err = orchestrator.run(None, 1, no_interrupt()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoManifest));
        assert!(executor.seen().is_empty());
        assert_eq!(*orchestrator.stage().borrow(), RunStage::Complete);
    }

    #[tokio::test]
    async fn malformed_manifest_fails_before_dispatch() {
        let (orchestrator, executor, _) = harness(ScriptedExecutor::new(), 2);

        let dup = br#"[{"name":"t","env":{}},{"name":"t","env":{}}]"#;
        let err = orchestrator
            .run(Some(dup), 1, no_interrupt())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ManifestFormat(_)));
        assert!(executor.seen().is_empty());
    }

    #[tokio::test]
    async fn single_worker_drains_the_whole_queue() {
        let (orchestrator, executor, _) = harness(ScriptedExecutor::new(), 1);

        let report = orchestrator
            .run(Some(THREE_TASKS), 1, no_interrupt())
            .await
            .unwrap();

        assert_eq!(report.result, RunResult::Succeeded);
        assert!(executor.seen().iter().all(|&(_, w)| w == 0));
        assert_eq!(executor.seen().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_aborts_in_flight_work() {
        let (orchestrator, executor, store) = harness(
            ScriptedExecutor::new().with_delay(Duration::from_secs(3600)),
            2,
        );
        let (tx, rx) = watch::channel(false);

        let run = tokio::spawn({
            let rx = rx.clone();
            async move { orchestrator.run(Some(THREE_TASKS), 1, rx).await }
        });

        // Let both workers pick up a task, then pull the plug.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.result, RunResult::Failed);
        // Two tasks were in flight and got aborted; the third never ran.
        assert_eq!(executor.seen().len(), 2);
        let aborted: Vec<_> = report
            .tasks
            .iter()
            .filter(|t| t.outcome() == TaskOutcome::Failed)
            .collect();
        assert_eq!(aborted.len(), 2);
        assert!(aborted.iter().all(|t| t.duration().is_none()));
        assert_eq!(
            report
                .tasks
                .iter()
                .filter(|t| t.outcome() == TaskOutcome::NotRun)
                .count(),
            1
        );

        // The final state, including the abort, was persisted.
        use crate::ports::RunHistory;
        let runs = store.runs().await.unwrap();
        assert_eq!(runs[0].result, Some(RunResult::Failed));
    }

    #[tokio::test]
    async fn sole_worker_panicking_still_completes_the_run() {
        let store = Arc::new(InMemoryRunStore::new());
        let orchestrator = wired(store.clone(), Arc::new(PanickingExecutor::new(&["a"])), 1);

        // The only worker dies on the first task; the run must still reach
        // a report instead of waiting forever on the queued remainder.
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.run(Some(THREE_TASKS), 1, no_interrupt()),
        )
        .await
        .expect("run must finish after its only worker dies")
        .unwrap();

        assert_eq!(report.result, RunResult::Failed);
        assert_eq!(*orchestrator.stage().borrow(), RunStage::Complete);
        let a = report.tasks.iter().find(|t| t.name() == "a").unwrap();
        assert_eq!(a.outcome(), TaskOutcome::Failed);
        assert!(a.duration().is_none());
        assert_eq!(
            report
                .tasks
                .iter()
                .filter(|t| t.outcome() == TaskOutcome::NotRun)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn panicked_task_is_swept_and_feeds_no_history() {
        let store = Arc::new(InMemoryRunStore::new());
        let orchestrator = wired(store.clone(), Arc::new(PanickingExecutor::new(&["b"])), 2);

        let report = orchestrator
            .run(Some(THREE_TASKS), 1, no_interrupt())
            .await
            .unwrap();
        assert_eq!(report.result, RunResult::Failed);
        let b = report.tasks.iter().find(|t| t.name() == "b").unwrap();
        assert_eq!(b.outcome(), TaskOutcome::Failed);
        assert!(b.duration().is_none());

        // Nothing persists as Running.
        use crate::ports::{RunHistory, RunStore};
        let stored = store.load(1).await.unwrap().unwrap();
        assert!(stored
            .list()
            .iter()
            .all(|t| t.outcome() != TaskOutcome::Running));
        assert_eq!(store.runs().await.unwrap()[0].result, Some(RunResult::Failed));

        // The next run links durations for the siblings but not for the
        // task whose worker died.
        let orchestrator = wired(store.clone(), Arc::new(ScriptedExecutor::new()), 2);
        let report = orchestrator
            .run(Some(THREE_TASKS), 2, no_interrupt())
            .await
            .unwrap();
        let a = report.tasks.iter().find(|t| t.name() == "a").unwrap();
        let b = report.tasks.iter().find(|t| t.name() == "b").unwrap();
        assert!(a.previous_duration().is_some());
        assert!(b.previous_duration().is_none());
    }

    #[tokio::test]
    async fn second_run_prioritizes_and_reports_delta() {
        // Run 1 with a single slow worker records real durations; run 2
        // must dispatch the historically slowest task first.
        let store = Arc::new(InMemoryRunStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ));

        struct ClockedExecutor {
            clock: Arc<FixedClock>,
            order: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl TaskExecutor for ClockedExecutor {
            async fn execute(&self, task: &DispatchedTask, _worker: usize) -> bool {
                self.order.lock().unwrap().push(task.name.clone());
                let ms: i64 = task
                    .environment
                    .get("COST_MS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                self.clock.advance(chrono::TimeDelta::milliseconds(ms));
                true
            }
        }

        let manifest = br#"[
            {"name":"cheap","env":{"COST_MS":"100"}},
            {"name":"expensive","env":{"COST_MS":"5000"}}
        ]"#;

        let executor = Arc::new(ClockedExecutor {
            clock: clock.clone(),
            order: Mutex::new(Vec::new()),
        });
        let coordinator = Arc::new(DispatchCoordinator::new(
            HistoryLinker::new(store.clone()),
            store.clone(),
            Arc::new(MemoryEventSink::new()),
            clock.clone(),
        ));
        let orchestrator = RunOrchestrator::new(coordinator, executor.clone(), 1);

        let report = orchestrator
            .run(Some(manifest), 1, no_interrupt())
            .await
            .unwrap();
        assert_eq!(report.result, RunResult::Succeeded);
        // First run: manifest order.
        assert_eq!(*executor.order.lock().unwrap(), ["cheap", "expensive"]);

        // Second run, fresh coordinator, same store.
        let coordinator = Arc::new(DispatchCoordinator::new(
            HistoryLinker::new(store.clone()),
            store.clone(),
            Arc::new(MemoryEventSink::new()),
            clock.clone(),
        ));
        let orchestrator = RunOrchestrator::new(coordinator, executor.clone(), 1);
        executor.order.lock().unwrap().clear();

        let report = orchestrator
            .run(Some(manifest), 2, no_interrupt())
            .await
            .unwrap();

        assert_eq!(*executor.order.lock().unwrap(), ["expensive", "cheap"]);
        let expensive = report
            .tasks
            .iter()
            .find(|t| t.name() == "expensive")
            .unwrap();
        assert_eq!(
            expensive.previous_duration(),
            Some(Duration::from_millis(5000))
        );
        assert_eq!(
            expensive.duration_delta(),
            Some(chrono::TimeDelta::zero())
        );
    }

    #[tokio::test]
    async fn worker_count_is_at_least_one() {
        let (orchestrator, _, _) = harness(ScriptedExecutor::new(), 0);
        let report = orchestrator
            .run(Some(TWO_TASKS), 1, no_interrupt())
            .await
            .unwrap();
        assert_eq!(report.result, RunResult::Succeeded);
    }
}
