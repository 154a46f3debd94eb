use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named capability profile that tasks are assigned to.
///
/// Agents are read-only inputs to the orchestrator: a job's roster is fixed
/// when the job is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Shown to the decomposer when assigning tasks.
    #[serde(default)]
    pub description: String,
    /// System instructions passed to the reasoning backend.
    pub instructions: String,
    /// Identifiers of the tools this agent may call.
    #[serde(default)]
    pub tool_ids: Vec<String>,
}

impl Agent {
    /// New agent with a fresh id and no tools.
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            tool_ids: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the allowed tool ids.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_ids = tools.into_iter().map(Into::into).collect();
        self
    }
}
