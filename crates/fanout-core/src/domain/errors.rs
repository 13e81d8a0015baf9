//! Error types for the dispatch engine.

use thiserror::Error;

/// Errors that are fatal to a run or to run-state persistence.
///
/// Deliberately narrow: an individual task failing is data (a `Failed`
/// outcome on its record), and a caller misusing `complete` is a logged
/// protocol violation, not an error value.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Manifest bytes did not describe a sequence of uniquely-named tasks.
    #[error("malformed task manifest: {0}")]
    ManifestFormat(String),

    /// No manifest was supplied at all (configuration problem).
    #[error("no task manifest was provided")]
    NoManifest,

    /// Run-state persistence failed at the filesystem level.
    #[error("run store I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted run state could not be encoded or decoded.
    #[error("run state encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
