//! Ports: the seams between the dispatch engine and its collaborators.
//!
//! Everything the engine does not own — wall-clock time, the external work a
//! task performs, where run state is stored, how prior runs are listed, and
//! where observability events go — is reached through one of these traits.

pub mod clock;
pub mod event_sink;
pub mod executor;
pub mod history;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, LogEventSink, MemoryEventSink};
pub use self::executor::TaskExecutor;
pub use self::history::{RunHistory, RunSummary};
pub use self::store::RunStore;
