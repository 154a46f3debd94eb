//! Tools ("skills") that agents may call while executing a task.
//!
//! # Main types
//!
//! - [`Skill`] - A single callable tool with a JSON-schema descriptor.
//! - [`SkillRegistry`] - Process-wide tool catalogue; also a [`ToolProvider`].
//! - [`ToolProvider`] / [`ToolSession`] - Scoped acquisition of the tools an
//!   agent is allowed to use for one invocation.

/// Built-in tools.
pub mod builtins;
/// Tool catalogue.
pub mod registry;
/// Scoped tool sessions.
pub mod session;
/// The skill trait.
pub mod skill;

pub use builtins::{register_builtins, CurrentTimeSkill, EchoSkill};
pub use registry::SkillRegistry;
pub use session::{ToolProvider, ToolSession};
pub use skill::{Skill, SkillDescriptor};
