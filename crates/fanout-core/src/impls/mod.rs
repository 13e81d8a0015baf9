//! Implementations of the storage ports.

mod json_store;
mod memory_store;

pub use self::json_store::JsonRunStore;
pub use self::memory_store::InMemoryRunStore;
