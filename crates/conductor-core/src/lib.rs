//! Core types and error definitions for the Conductor job orchestrator.
//!
//! This crate provides the data model shared across all Conductor crates:
//! jobs, tasks, attempts and agents, the state machines that govern job and
//! task status, tool-call records, and the unified error type.
//!
//! # Main types
//!
//! - [`ConductorError`] - Unified error enum for all Conductor subsystems.
//! - [`ConductorResult`] - Convenience alias for `Result<T, ConductorError>`.
//! - [`Job`] / [`JobStatus`] - A user goal and its lifecycle.
//! - [`Task`] / [`TaskStatus`] - One ordered unit of work within a job.
//! - [`Attempt`] / [`AttemptStatus`] - One execution try of a task.
//! - [`Agent`] - Capability profile (instructions + tools) assigned to tasks.
//! - [`ToolCall`] / [`ToolResult`] / [`ToolCallRecord`] - Tool invocation types.

/// Agent capability profiles.
pub mod agent;
/// Jobs and the job state machine.
pub mod job;
/// Tasks, attempts and the task state machine.
pub mod task;
/// Tool call, result and trace record types.
pub mod tool;

pub use agent::Agent;
pub use job::{Job, JobStatus};
pub use task::{Attempt, AttemptStatus, Task, TaskStatus, TaskUpdate};
pub use tool::{ToolCall, ToolCallRecord, ToolResult};

use uuid::Uuid;

// --- Error types ---

/// Top-level error type for Conductor.
///
/// Each variant corresponds to a subsystem or a class of failure.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// An operation was rejected before it could start (bad input or state).
    #[error("Config error: {0}")]
    Config(String),

    /// A state machine refused a transition.
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        /// Kind of entity (`job` or `task`).
        entity: &'static str,
        /// Status before the attempted transition.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A job, task or agent lookup failed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller does not own the resource it tried to act on.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A run is already active for the job.
    #[error("Job {0} is already running")]
    AlreadyRunning(Uuid),

    /// Goal decomposition failed or produced malformed output.
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// An error from the agent reasoning loop.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error raised by a tool during invocation or session setup.
    #[error("Skill error: {0}")]
    Skill(String),

    /// An error from the persistence layer.
    #[error("Store error: {0}")]
    Store(String),

    /// An invocation exceeded its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An error from the orchestration engine.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ConductorError`].
pub type ConductorResult<T> = Result<T, ConductorError>;
