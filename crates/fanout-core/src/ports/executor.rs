//! TaskExecutor port: the external work a task performs.

use async_trait::async_trait;

use crate::domain::DispatchedTask;

/// Executes one task's payload in the context of a worker slot.
///
/// This is the boundary to the surrounding build system: checkout, workspace
/// provisioning and the actual process spawn all live behind it. The engine
/// only cares about the boolean verdict, which it turns into `complete`.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &DispatchedTask, worker: usize) -> bool;
}
