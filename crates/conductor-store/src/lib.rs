//! Persistence of jobs, their tasks and attempt history.
//!
//! The orchestrator owns every state-machine decision; stores only record
//! the outcome. Attempt history is append-only.

/// JSON-file store.
pub mod file;
/// In-memory store.
pub mod memory;
/// The store trait.
pub mod store;

pub use file::FileJobStore;
pub use memory::InMemoryJobStore;
pub use store::JobStore;
