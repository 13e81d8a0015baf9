//! fanout-core
//!
//! Task coordination and dispatch engine: fans one logical build out across
//! a fixed pool of concurrent worker slots and reassembles per-task outcomes
//! and timing history for comparison across runs.
//!
//! # Module layout
//! - **domain**: task records, outcomes, duration rendering, events, errors
//! - **registry**: manifest parsing and the name-keyed task registry
//! - **history**: linking the current task set to a comparable prior run
//! - **queue**: the priority dispatch queue (longest-expected-first)
//! - **coordinator**: the synchronized entry point worker loops share
//! - **ports**: clock, event sink, executor, run history, run store seams
//! - **impls**: JSON file store and in-memory store
//! - **app**: the run orchestrator (worker slots, drain, aggregate result)

pub mod app;
pub mod coordinator;
pub mod domain;
pub mod history;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod registry;

pub use self::app::{RunOrchestrator, RunReport, RunStage};
pub use self::coordinator::DispatchCoordinator;
pub use self::domain::{
    DispatchError, DispatchEvent, DispatchedTask, RunResult, TaskOutcome, TaskRecord,
    format_delta, format_duration,
};
pub use self::history::HistoryLinker;
pub use self::impls::{InMemoryRunStore, JsonRunStore};
pub use self::ports::{
    Clock, EventSink, FixedClock, LogEventSink, MemoryEventSink, RunHistory, RunStore,
    RunSummary, SystemClock, TaskExecutor,
};
pub use self::queue::PriorityDispatchQueue;
pub use self::registry::TaskRegistry;
