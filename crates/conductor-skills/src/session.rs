use crate::skill::SkillDescriptor;
use async_trait::async_trait;
use conductor_core::{ConductorResult, ToolCall, ToolResult};

/// Hands out tool sessions scoped to a single reasoning invocation.
///
/// Implementations may hold external connections per session (remote tool
/// servers, sandboxes). Whoever opens a session must [`ToolSession::close`]
/// it on every path, including failures.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Open a session exposing exactly `tool_ids`.
    ///
    /// Fails if any id is unknown to the provider.
    async fn open(&self, tool_ids: &[String]) -> ConductorResult<Box<dyn ToolSession>>;
}

/// The set of tools available to one invocation.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Descriptors advertised to the reasoning backend.
    fn descriptors(&self) -> &[SkillDescriptor];

    /// Invoke a tool. Tool-level failures come back as an error
    /// [`ToolResult`]; `Err` is reserved for infrastructure failures.
    async fn call(&self, call: ToolCall) -> ConductorResult<ToolResult>;

    /// Release any resources held by the session.
    async fn close(&self) -> ConductorResult<()>;
}
