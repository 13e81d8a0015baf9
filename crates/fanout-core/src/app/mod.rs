//! Application layer: the outer run control loop.

pub mod orchestrator;

pub use self::orchestrator::{RunOrchestrator, RunReport, RunStage};
