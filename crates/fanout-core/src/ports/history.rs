//! RunHistory port: read-only access to prior runs.

use async_trait::async_trait;

use crate::domain::{DispatchError, RunResult};
use crate::registry::TaskRegistry;

/// Identity and aggregate result of one stored run.
///
/// `result == None` means the run never completed (still in progress when
/// its state was last written, or the process died). Such runs are not
/// comparable for history linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub run_number: u64,
    pub result: Option<RunResult>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }
}

/// Lists this job's historical runs, newest first, and loads their frozen
/// task registries. Supplied by the surrounding persistence layer; the
/// engine only ever reads through it.
#[async_trait]
pub trait RunHistory: Send + Sync {
    async fn runs(&self) -> Result<Vec<RunSummary>, DispatchError>;

    async fn registry(&self, run_number: u64) -> Result<Option<TaskRegistry>, DispatchError>;
}
