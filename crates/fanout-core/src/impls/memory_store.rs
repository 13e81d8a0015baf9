//! In-memory run store (development and tests).

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{DispatchError, RunResult};
use crate::ports::{RunHistory, RunStore, RunSummary};
use crate::registry::TaskRegistry;

struct StoredRun {
    result: Option<RunResult>,
    registry: TaskRegistry,
}

/// Keeps run state in a map. Same contract as [`JsonRunStore`] without the
/// filesystem; the store double used throughout the test suite.
///
/// [`JsonRunStore`]: super::JsonRunStore
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<BTreeMap<u64, StoredRun>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(
        &self,
        run_number: u64,
        result: Option<RunResult>,
        registry: &TaskRegistry,
    ) -> Result<(), DispatchError> {
        let mut runs = self.runs.lock().await;
        runs.insert(
            run_number,
            StoredRun {
                result,
                registry: registry.clone(),
            },
        );
        Ok(())
    }

    async fn load(&self, run_number: u64) -> Result<Option<TaskRegistry>, DispatchError> {
        let runs = self.runs.lock().await;
        Ok(runs.get(&run_number).map(|r| r.registry.clone()))
    }
}

#[async_trait]
impl RunHistory for InMemoryRunStore {
    async fn runs(&self) -> Result<Vec<RunSummary>, DispatchError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .iter()
            .rev()
            .map(|(&run_number, stored)| RunSummary {
                run_number,
                result: stored.result,
            })
            .collect())
    }

    async fn registry(&self, run_number: u64) -> Result<Option<TaskRegistry>, DispatchError> {
        self.load(run_number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_runs_newest_first() {
        let store = InMemoryRunStore::new();
        let registry = TaskRegistry::parse(br#"[{"name":"t","env":{}}]"#, 1).unwrap();

        store.save(1, Some(RunResult::Succeeded), &registry).await.unwrap();
        store.save(3, None, &registry).await.unwrap();
        store.save(2, Some(RunResult::Failed), &registry).await.unwrap();

        let runs = store.runs().await.unwrap();
        let numbers: Vec<_> = runs.iter().map(|r| r.run_number).collect();
        assert_eq!(numbers, [3, 2, 1]);
    }

    #[tokio::test]
    async fn save_overwrites_and_load_roundtrips() {
        let store = InMemoryRunStore::new();
        let registry = TaskRegistry::parse(br#"[{"name":"t","env":{}}]"#, 5).unwrap();

        store.save(5, None, &registry).await.unwrap();
        store.save(5, Some(RunResult::Failed), &registry).await.unwrap();

        let runs = store.runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].result, Some(RunResult::Failed));
        assert!(store.load(5).await.unwrap().is_some());
        assert!(store.load(6).await.unwrap().is_none());
    }
}
