use crate::registry::SkillRegistry;
use crate::skill::{Skill, SkillDescriptor};
use async_trait::async_trait;
use conductor_core::{ConductorResult, ToolCall, ToolResult};
use std::sync::Arc;

/// Register the standard set of built-in tools.
pub fn register_builtins(registry: &mut SkillRegistry) {
    registry.register(Arc::new(EchoSkill::new()));
    registry.register(Arc::new(CurrentTimeSkill::new()));
}

/// Returns its `text` argument unchanged. Useful for wiring checks.
pub struct EchoSkill {
    descriptor: SkillDescriptor,
}

impl EchoSkill {
    /// Create the skill.
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "echo".to_string(),
                description: "Echo the given text back.".to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string", "description": "Text to echo" }
                    },
                    "required": ["text"]
                }),
            },
        }
    }
}

impl Default for EchoSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for EchoSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> ConductorResult<ToolResult> {
        match call.arguments["text"].as_str() {
            Some(text) => Ok(ToolResult::success(&call.id, text)),
            None => Ok(ToolResult::error(&call.id, "missing required argument 'text'")),
        }
    }
}

/// Reports the current UTC time in RFC 3339 format.
pub struct CurrentTimeSkill {
    descriptor: SkillDescriptor,
}

impl CurrentTimeSkill {
    /// Create the skill.
    pub fn new() -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "current_time".to_string(),
                description: "Return the current UTC date and time (RFC 3339).".to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        }
    }
}

impl Default for CurrentTimeSkill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Skill for CurrentTimeSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> ConductorResult<ToolResult> {
        Ok(ToolResult::success(&call.id, chrono::Utc::now().to_rfc3339()))
    }
}
