//! Priority dispatch queue: longest-expected work first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::registry::TaskRegistry;

/// Heap entry. The priority key is the task's historical duration, fixed at
/// seed time; `seq` is the manifest position and never changes either, so
/// heap invariants hold for the entry's whole life.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingTask {
    previous_duration: Option<Duration>,
    seq: usize,
    name: String,
}

impl PartialOrd for PendingTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Larger historical duration wins; unknown (None) sorts below every
        // known value, so unknown-cost work is dispatched last. Ties break
        // by manifest position, earliest first.
        self.previous_duration
            .cmp(&other.previous_duration)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending-work queue for one run, ordered by historical duration descending.
///
/// Tie-break rule: tasks with equal (or no) historical duration are
/// dispatched in manifest order. On a first-ever run, where nothing has a
/// history, the whole queue degrades to exactly manifest order.
///
/// The queue itself is plain data. Atomicity of [`pop`](Self::pop) against
/// concurrent workers comes from the coordinator's mutex, which is the only
/// thing that touches it.
#[derive(Debug, Default)]
pub struct PriorityDispatchQueue {
    heap: BinaryHeap<PendingTask>,
}

impl PriorityDispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the priority structure from the registry's NotRun records.
    /// Called once per run, after history linking fixed the priority keys.
    pub fn seed(&mut self, registry: &TaskRegistry) {
        debug_assert!(self.heap.is_empty(), "queue seeded twice");
        for (seq, record) in registry.list().iter().enumerate() {
            self.heap.push(PendingTask {
                previous_duration: record.previous_duration(),
                seq,
                name: record.name().to_string(),
            });
        }
    }

    /// Remove and return the highest-priority pending task name.
    pub fn pop(&mut self) -> Option<String> {
        self.heap.pop().map(|t| t.name)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskRegistry;

    fn registry_with_durations(tasks: &[(&str, Option<u64>)]) -> TaskRegistry {
        let manifest: Vec<String> = tasks
            .iter()
            .map(|(name, _)| format!(r#"{{"name":"{name}","env":{{}}}}"#))
            .collect();
        let manifest = format!("[{}]", manifest.join(","));
        let mut registry = TaskRegistry::parse(manifest.as_bytes(), 1).unwrap();
        for (name, ms) in tasks {
            if let Some(ms) = ms {
                registry
                    .get_mut(name)
                    .unwrap()
                    .set_previous_duration(Duration::from_millis(*ms));
            }
        }
        registry
    }

    fn drain(queue: &mut PriorityDispatchQueue) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(name) = queue.pop() {
            names.push(name);
        }
        names
    }

    #[test]
    fn longest_historical_duration_first() {
        let registry = registry_with_durations(&[
            ("quick", Some(1_000)),
            ("slow", Some(300_000)),
            ("medium", Some(60_000)),
        ]);
        let mut queue = PriorityDispatchQueue::new();
        queue.seed(&registry);

        assert_eq!(drain(&mut queue), ["slow", "medium", "quick"]);
    }

    #[test]
    fn unknown_duration_dispatches_last() {
        let registry = registry_with_durations(&[
            ("new_task", None),
            ("known", Some(5)),
        ]);
        let mut queue = PriorityDispatchQueue::new();
        queue.seed(&registry);

        assert_eq!(drain(&mut queue), ["known", "new_task"]);
    }

    #[test]
    fn first_run_degrades_to_manifest_order() {
        let registry =
            registry_with_durations(&[("c", None), ("a", None), ("b", None)]);
        let mut queue = PriorityDispatchQueue::new();
        queue.seed(&registry);

        assert_eq!(drain(&mut queue), ["c", "a", "b"]);
    }

    #[test]
    fn equal_durations_break_ties_by_manifest_order() {
        let registry = registry_with_durations(&[
            ("second", Some(1_000)),
            ("third", Some(1_000)),
            ("first", Some(2_000)),
        ]);
        let mut queue = PriorityDispatchQueue::new();
        queue.seed(&registry);

        assert_eq!(drain(&mut queue), ["first", "second", "third"]);
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let mut queue = PriorityDispatchQueue::new();
        queue.seed(&registry_with_durations(&[]));
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
