//! History linking: recover task durations from the nearest comparable run.

use std::sync::Arc;

use crate::domain::{DispatchError, RunResult};
use crate::ports::{RunHistory, RunSummary};
use crate::registry::TaskRegistry;

/// Links the current run's task set to the most recent comparable prior run
/// so dispatch can order work by historical duration.
///
/// Tasks sets may change between runs; a name with no match simply keeps no
/// historical duration. That is expected, not an error.
pub struct HistoryLinker {
    history: Arc<dyn RunHistory>,
}

impl HistoryLinker {
    pub fn new(history: Arc<dyn RunHistory>) -> Self {
        Self { history }
    }

    /// The most recent prior run worth comparing against.
    ///
    /// Preference order: newest completed run that did not fail; failing
    /// that, newest completed run of any result; failing that, none.
    pub async fn find_comparable_run(
        &self,
        current_run: u64,
    ) -> Result<Option<RunSummary>, DispatchError> {
        let runs = self.history.runs().await?;
        let candidates: Vec<RunSummary> = runs
            .into_iter()
            .filter(|r| r.run_number != current_run && r.is_complete())
            .collect();

        let not_failed = candidates
            .iter()
            .find(|r| r.result == Some(RunResult::Succeeded))
            .copied();
        Ok(not_failed.or_else(|| candidates.first().copied()))
    }

    /// Copy durations from the comparable run into `registry`.
    ///
    /// Returns the linked run number and how many names matched, or `None`
    /// when there was no comparable run (first-ever run).
    pub async fn link_durations(
        &self,
        registry: &mut TaskRegistry,
        current_run: u64,
    ) -> Result<Option<(u64, usize)>, DispatchError> {
        let Some(prior) = self.find_comparable_run(current_run).await? else {
            return Ok(None);
        };
        let Some(prior_registry) = self.history.registry(prior.run_number).await? else {
            return Ok(None);
        };

        let mut matched = 0;
        for record in registry.iter_mut() {
            let Some(prior_record) = prior_registry.get(record.name()) else {
                continue;
            };
            if let Some(duration) = prior_record.duration() {
                record.set_previous_duration(duration);
                matched += 1;
            }
        }
        Ok(Some((prior.run_number, matched)))
    }
}
