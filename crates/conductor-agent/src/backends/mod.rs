/// OpenAI-compatible chat-completions backend.
pub mod openai;

use async_trait::async_trait;
use conductor_core::ConductorResult;
use conductor_skills::ToolSession;

/// Input to one reasoning-with-tools invocation.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    /// System instructions (the agent's profile).
    pub instructions: String,
    /// User prompt (goal, prior results and the task itself).
    pub prompt: String,
    /// Maximum number of model round-trips that may request tools.
    pub max_steps: u32,
}

/// Final answer of a reasoning-with-tools invocation.
#[derive(Debug, Clone, Default)]
pub struct ReasoningOutput {
    /// Final answer text.
    pub text: String,
    /// Reasoning trace reported by the provider, if any.
    pub reasoning: Option<String>,
    /// Model round-trips used.
    pub steps: u32,
}

/// Plain completion without tools.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Completion text.
    pub text: String,
    /// Reasoning trace reported by the provider, if any.
    pub reasoning: Option<String>,
}

/// Trait for text-generation providers.
///
/// Tool calls must be routed through the supplied [`ToolSession`]; that is
/// where they are executed and recorded.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Single completion, no tools. Used for goal decomposition.
    async fn complete(&self, system: &str, prompt: &str) -> ConductorResult<Completion>;

    /// Run the tool-calling loop until the model answers or
    /// `request.max_steps` round-trips have been spent.
    async fn execute_with_tools(
        &self,
        request: &ReasoningRequest,
        tools: &dyn ToolSession,
    ) -> ConductorResult<ReasoningOutput>;
}
