//! File-backed run store: one JSON document per run.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{DispatchError, RunResult};
use crate::ports::{RunHistory, RunStore, RunSummary};
use crate::registry::TaskRegistry;

/// On-disk shape of one run: aggregate result plus the full record list.
#[derive(Debug, Serialize, Deserialize)]
struct RunStateFile {
    run_number: u64,
    result: Option<RunResult>,
    tasks: TaskRegistry,
}

/// Stores each run as `run-NNNNNN.json` under a root directory.
///
/// Files are small (one per run, a record per task) so reads and writes are
/// plain synchronous filesystem calls; nothing here sits on a hot path.
pub struct JsonRunStore {
    root: PathBuf,
}

impl JsonRunStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DispatchError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, run_number: u64) -> PathBuf {
        self.root.join(format!("run-{run_number:06}.json"))
    }

    fn parse_run_number(path: &Path) -> Option<u64> {
        let stem = path.file_stem()?.to_str()?;
        stem.strip_prefix("run-")?.parse().ok()
    }

    fn read_state(&self, path: &Path) -> Result<RunStateFile, DispatchError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Highest stored run number, if any. Callers use this to pick the next
    /// run number.
    pub fn latest_run_number(&self) -> Result<Option<u64>, DispatchError> {
        let mut latest = None;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(n) = Self::parse_run_number(&entry.path()) {
                latest = latest.max(Some(n));
            }
        }
        Ok(latest)
    }
}

#[async_trait]
impl RunStore for JsonRunStore {
    async fn save(
        &self,
        run_number: u64,
        result: Option<RunResult>,
        registry: &TaskRegistry,
    ) -> Result<(), DispatchError> {
        let state = RunStateFile {
            run_number,
            result,
            tasks: registry.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&state)?;
        fs::write(self.path_for(run_number), bytes)?;
        Ok(())
    }

    async fn load(&self, run_number: u64) -> Result<Option<TaskRegistry>, DispatchError> {
        let path = self.path_for(run_number);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_state(&path)?.tasks))
    }
}

#[async_trait]
impl RunHistory for JsonRunStore {
    async fn runs(&self) -> Result<Vec<RunSummary>, DispatchError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if Self::parse_run_number(&path).is_none() {
                continue;
            }
            let state = self.read_state(&path)?;
            summaries.push(RunSummary {
                run_number: state.run_number,
                result: state.result,
            });
        }
        summaries.sort_by(|a, b| b.run_number.cmp(&a.run_number));
        Ok(summaries)
    }

    async fn registry(&self, run_number: u64) -> Result<Option<TaskRegistry>, DispatchError> {
        self.load(run_number).await
    }
}
