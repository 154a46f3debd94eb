use async_trait::async_trait;
use conductor_core::{ConductorResult, ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// Metadata describing a skill's interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Tool name used in calls.
    pub name: String,
    /// Shown to the model.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters_schema: serde_json::Value,
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Name, description and argument schema.
    fn descriptor(&self) -> &SkillDescriptor;

    /// Run the tool. Tool failures belong in an error [`ToolResult`].
    async fn execute(&self, call: ToolCall) -> ConductorResult<ToolResult>;
}
