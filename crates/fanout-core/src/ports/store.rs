//! RunStore port: durable per-run state.

use async_trait::async_trait;

use crate::domain::{DispatchError, RunResult};
use crate::registry::TaskRegistry;

/// Persists a run's task registry and aggregate result.
///
/// Written twice per run: once after ingest (in progress, `result: None`)
/// and once at the end with the final result. A future run's history linker
/// reads this back through [`RunHistory`](super::RunHistory).
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(
        &self,
        run_number: u64,
        result: Option<RunResult>,
        registry: &TaskRegistry,
    ) -> Result<(), DispatchError>;

    async fn load(&self, run_number: u64) -> Result<Option<TaskRegistry>, DispatchError>;
}
