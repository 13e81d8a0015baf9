//! Task record: identity, environment, and schedule/result state.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::duration::opt_duration_ms;
use super::outcome::TaskOutcome;

/// One task's full state within a run.
///
/// Design:
/// - This is the single source of truth for a task; the dispatch queue holds
///   names only.
/// - All state transitions happen through methods, and only the coordinator
///   calls them while holding its lock. Fields, once set, never change value,
///   so snapshot clones are always internally consistent.
/// - `name` is the join key used to find the same task in a prior run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    name: String,

    /// Per-task environment, verbatim from the manifest. Key-ordered.
    environment: BTreeMap<String, String>,

    /// Run that owns this record (set once at ingestion).
    run_number: u64,

    /// Worker slot the task was handed to. Set together with `started_at`,
    /// exactly once, on dequeue.
    assigned_worker: Option<usize>,

    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,

    outcome: TaskOutcome,

    /// Duration of the same-named task in the linked prior run, if any.
    /// Fixed before the record enters the dispatch queue.
    #[serde(with = "opt_duration_ms")]
    previous_duration: Option<Duration>,
}

impl TaskRecord {
    pub fn new(name: String, environment: BTreeMap<String, String>, run_number: u64) -> Self {
        Self {
            name,
            environment,
            run_number,
            assigned_worker: None,
            started_at: None,
            finished_at: None,
            outcome: TaskOutcome::NotRun,
            previous_duration: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn run_number(&self) -> u64 {
        self.run_number
    }

    pub fn assigned_worker(&self) -> Option<usize> {
        self.assigned_worker
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn outcome(&self) -> TaskOutcome {
        self.outcome
    }

    pub fn previous_duration(&self) -> Option<Duration> {
        self.previous_duration
    }

    /// Record the historical duration resolved by the linker.
    ///
    /// Must happen before the record is seeded into the dispatch queue; the
    /// queue assumes the priority key is stable.
    pub(crate) fn set_previous_duration(&mut self, duration: Duration) {
        self.previous_duration = Some(duration);
    }

    /// Mark dequeued: stamp the worker slot and start time together.
    pub(crate) fn start(&mut self, worker: usize, at: DateTime<Utc>) {
        debug_assert_eq!(self.outcome, TaskOutcome::NotRun);
        self.assigned_worker = Some(worker);
        self.started_at = Some(at);
        self.outcome = TaskOutcome::Running;
    }

    /// Mark completed with the worker-reported result.
    pub(crate) fn finish(&mut self, succeeded: bool, at: DateTime<Utc>) {
        debug_assert_eq!(self.outcome, TaskOutcome::Running);
        self.finished_at = Some(at);
        self.outcome = if succeeded {
            TaskOutcome::Succeeded
        } else {
            TaskOutcome::Failed
        };
    }

    /// Mark failed because the run was interrupted mid-execution.
    ///
    /// `finished_at` stays unset, which makes `duration()` return `None`:
    /// an aborted task must not feed a misleadingly short duration into the
    /// next run's history linking.
    pub(crate) fn mark_aborted(&mut self) {
        debug_assert_eq!(self.outcome, TaskOutcome::Running);
        self.outcome = TaskOutcome::Failed;
    }

    /// Measured duration of this task, with the in-flight estimate taken
    /// against the wall clock.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_at(Utc::now())
    }

    /// Measured duration of this task against an explicit `now`.
    ///
    /// - Both timestamps set: exact `finished - started` (`now` unused).
    /// - Still running: in-flight estimate `now - started`.
    /// - Anything else (never started, or aborted): `None`.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let started = self.started_at?;
        match self.finished_at {
            Some(finished) => (finished - started).to_std().ok(),
            None if self.outcome == TaskOutcome::Running => (now - started).to_std().ok(),
            None => None,
        }
    }

    /// Signed difference between this run's duration and the linked prior
    /// run's. `None` if either side is unknown.
    pub fn duration_delta(&self) -> Option<TimeDelta> {
        let current = self.duration()?;
        let previous = self.previous_duration?;
        let current = TimeDelta::from_std(current).ok()?;
        let previous = TimeDelta::from_std(previous).ok()?;
        Some(current - previous)
    }

    /// Owned read-only view handed to worker loops.
    pub(crate) fn dispatched_view(&self) -> DispatchedTask {
        DispatchedTask {
            name: self.name.clone(),
            environment: self.environment.clone(),
        }
    }
}

/// What a worker gets from `next_task`: the task identity and environment,
/// nothing mutable. Completion is reported back by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedTask {
    pub name: String,
    pub environment: BTreeMap<String, String>,
}
