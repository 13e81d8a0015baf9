//! Domain model (task records, outcomes, durations, events, errors).

pub mod duration;
pub mod errors;
pub mod events;
pub mod outcome;
pub mod record;

pub use self::duration::{format_delta, format_duration};
pub use self::errors::DispatchError;
pub use self::events::DispatchEvent;
pub use self::outcome::{RunResult, TaskOutcome};
pub use self::record::{DispatchedTask, TaskRecord};
