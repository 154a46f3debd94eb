//! Job orchestration engine: runs a decomposed job's tasks in order with
//! retry and backoff, pause/resume/cancel control and live progress events.
//!
//! # Main types
//!
//! - [`OrchestratorManager`] - Process-wide entry point used by transports and the CLI.
//! - [`Orchestrator`] - The sequential run loop.
//! - [`EventBus`] - Per-job publish/subscribe of [`JobEvent`]s.
//! - [`RunRegistry`] - Live run state and the pause/resume/cancel signals.
//! - [`RetryPolicy`] - Attempt budget and exponential backoff.
//! - [`AgentMonitor`] - Per-agent metrics for the process.

/// Run-loop settings.
pub mod config;
/// The run loop.
pub mod engine;
/// Progress events and the event bus.
pub mod events;
/// Process-wide manager.
pub mod manager;
/// Agent metrics.
pub mod monitor;
/// Attempt budget and backoff.
pub mod retry;
/// Live run registry.
pub mod run_state;

pub use config::{MissingAgentPolicy, OrchestratorConfig};
pub use engine::{ensure_runnable, Orchestrator, RunOutcome};
pub use events::{EventBus, EventCallback, EventKind, JobEvent, Subscription};
pub use manager::{DecompositionSummary, OrchestratorManager};
pub use monitor::{AgentMetrics, AgentMonitor, AgentState, WorkerStatus};
pub use retry::RetryPolicy;
pub use run_state::{RunGuard, RunRegistry, RunStatus};
