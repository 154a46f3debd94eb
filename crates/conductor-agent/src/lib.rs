//! Agent-side collaborators of the Conductor orchestrator.
//!
//! # Main types
//!
//! - [`ReasoningBackend`] - Text generation with tool calling (one call per attempt).
//! - [`OpenAiBackend`] - OpenAI-compatible implementation over HTTP.
//! - [`TaskExecutor`] - Runs one task attempt for one agent and records its trace.
//! - [`GoalDecomposer`] - Validating adapter around a [`Decomposer`].
//! - [`LlmDecomposer`] - Decomposer that asks a reasoning backend for a JSON plan.

/// Reasoning backends.
pub mod backends;
/// Model configuration.
pub mod config;
/// Goal decomposition: collaborator trait, LLM implementation and validation.
pub mod decomposer;
/// Single-attempt task execution.
pub mod executor;

pub use backends::openai::OpenAiBackend;
pub use backends::{Completion, ReasoningBackend, ReasoningOutput, ReasoningRequest};
pub use config::{LlmProvider, ModelConfig};
pub use decomposer::{
    DecompositionPlan, Decomposer, GoalDecomposer, LlmDecomposer, PlannedTask, RawPlan,
    RawPlannedTask,
};
pub use executor::{
    ExecutionRequest, PriorResult, TaskExecution, TaskExecutor, ToolCallObserver, MAX_TOOL_STEPS,
};
