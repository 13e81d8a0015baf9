//! EventSink port: where dispatch events are recorded.

use std::sync::Mutex;

use crate::domain::DispatchEvent;

/// Records dispatch events. The coordinator emits through this and nothing
/// else; swapping the sink redirects the engine's entire observable output.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DispatchEvent);
}

/// Default sink: renders events as `tracing` log lines.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: DispatchEvent) {
        match event {
            DispatchEvent::TasksRead { run, count } => {
                tracing::info!(run, count, "read {count} tasks");
            }
            DispatchEvent::HistoryLinked {
                run,
                prior_run,
                matched,
            } => {
                tracing::info!(
                    run,
                    prior_run,
                    matched,
                    "linked {matched} task durations from run {prior_run}"
                );
            }
            DispatchEvent::TaskAllocated { task, worker } => {
                tracing::info!(%task, worker, "allocating {task} to worker {worker}");
            }
            DispatchEvent::TaskCompleted { task, succeeded } => {
                tracing::info!(%task, succeeded, "{task} completed");
            }
            DispatchEvent::RunAborted { run, aborted } => {
                tracing::warn!(run, aborted, "run aborted with {aborted} tasks in flight");
            }
            DispatchEvent::ProtocolViolation { task, reason } => {
                tracing::warn!(%task, %reason, "dispatch protocol violation (ignored)");
            }
        }
    }
}

/// Capturing sink for tests: events pile up in order.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DispatchEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<DispatchEvent> {
        std::mem::take(&mut self.events.lock().expect("sink lock poisoned"))
    }

    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: DispatchEvent) {
        self.events.lock().expect("sink lock poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_emission_order() {
        let sink = MemoryEventSink::new();
        sink.emit(DispatchEvent::TasksRead { run: 1, count: 2 });
        sink.emit(DispatchEvent::TaskAllocated {
            task: "t".to_string(),
            worker: 0,
        });

        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], DispatchEvent::TasksRead { run: 1, count: 2 });
        assert!(sink.events().is_empty());
    }
}
