use crate::session::{ToolProvider, ToolSession};
use crate::skill::{Skill, SkillDescriptor};
use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult, ToolCall, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Central registry for all available skills.
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Add or replace a skill under its descriptor name.
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.descriptor().name.clone();
        info!(skill = %name, "Registered skill");
        self.skills.insert(name, skill);
    }

    /// Look up a skill by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    /// Descriptors of every registered skill.
    pub fn list_descriptors(&self) -> Vec<&SkillDescriptor> {
        let mut descriptors: Vec<&SkillDescriptor> =
            self.skills.values().map(|s| s.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Execute a tool call against the full registry.
    pub async fn execute(&self, call: ToolCall) -> ConductorResult<ToolResult> {
        let skill = self
            .skills
            .get(&call.name)
            .ok_or_else(|| ConductorError::Skill(format!("Unknown skill: {}", call.name)))?;
        skill.execute(call).await
    }

    /// Number of registered skills.
    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolProvider for SkillRegistry {
    async fn open(&self, tool_ids: &[String]) -> ConductorResult<Box<dyn ToolSession>> {
        let mut skills = Vec::with_capacity(tool_ids.len());
        for id in tool_ids {
            let skill = self
                .skills
                .get(id)
                .ok_or_else(|| ConductorError::Skill(format!("Unknown tool: {id}")))?;
            skills.push(Arc::clone(skill));
        }
        debug!(tools = ?tool_ids, "Opened tool session");
        Ok(Box::new(RegistrySession::new(skills)))
    }
}

/// A session over a subset of the registry's skills.
struct RegistrySession {
    skills: HashMap<String, Arc<dyn Skill>>,
    descriptors: Vec<SkillDescriptor>,
}

impl RegistrySession {
    fn new(skills: Vec<Arc<dyn Skill>>) -> Self {
        let descriptors = skills.iter().map(|s| s.descriptor().clone()).collect();
        let skills = skills
            .into_iter()
            .map(|s| (s.descriptor().name.clone(), s))
            .collect();
        Self {
            skills,
            descriptors,
        }
    }
}

#[async_trait]
impl ToolSession for RegistrySession {
    fn descriptors(&self) -> &[SkillDescriptor] {
        &self.descriptors
    }

    async fn call(&self, call: ToolCall) -> ConductorResult<ToolResult> {
        match self.skills.get(&call.name) {
            Some(skill) => skill.execute(call).await,
            None => Ok(ToolResult::error(
                &call.id,
                format!("Tool '{}' is not available to this agent", call.name),
            )),
        }
    }

    async fn close(&self) -> ConductorResult<()> {
        debug!(tools = self.skills.len(), "Closed tool session");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::builtins::{register_builtins, EchoSkill};

    fn echo_call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: serde_json::json!({"text": "ping"}),
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill::new()));
        assert_eq!(registry.skill_count(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_execute_unknown_skill() {
        let registry = SkillRegistry::new();
        let err = registry.execute(echo_call("nope")).await.unwrap_err();
        assert!(err.to_string().contains("Unknown skill"));
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_tool() {
        let mut registry = SkillRegistry::new();
        register_builtins(&mut registry);
        let result = registry.open(&["echo".into(), "teleport".into()]).await;
        assert!(matches!(result, Err(ConductorError::Skill(_))));
    }

    #[tokio::test]
    async fn test_session_scopes_tools() {
        let mut registry = SkillRegistry::new();
        register_builtins(&mut registry);

        let session = registry.open(&["echo".into()]).await.unwrap();
        assert_eq!(session.descriptors().len(), 1);
        assert_eq!(session.descriptors()[0].name, "echo");

        let ok = session.call(echo_call("echo")).await.unwrap();
        assert!(!ok.is_error);
        assert_eq!(ok.content, "ping");

        let denied = session.call(echo_call("current_time")).await.unwrap();
        assert!(denied.is_error);
        assert!(denied.content.contains("not available"));

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_session() {
        let registry = SkillRegistry::new();
        let session = registry.open(&[]).await.unwrap();
        assert!(session.descriptors().is_empty());
        session.close().await.unwrap();
    }
}
