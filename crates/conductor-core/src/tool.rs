use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request from the reasoning backend to invoke a specific tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the backend for this call.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// JSON arguments.
    pub arguments: serde_json::Value,
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this answers.
    pub call_id: String,
    /// Tool output or error text.
    pub content: String,
    /// Whether the tool failed.
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Trace entry for one tool call made during an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name.
    pub name: String,
    /// JSON arguments.
    pub arguments: serde_json::Value,
    /// Tool output when the call succeeded.
    #[serde(default)]
    pub result: Option<String>,
    /// Error text when the call failed.
    #[serde(default)]
    pub error: Option<String>,
    /// When the call was made.
    pub called_at: DateTime<Utc>,
}

impl ToolCallRecord {
    /// Build a record from a call and the result it produced.
    pub fn from_result(call: &ToolCall, result: &ToolResult) -> Self {
        let (result, error) = if result.is_error {
            (None, Some(result.content.clone()))
        } else {
            (Some(result.content.clone()), None)
        };
        Self {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            error,
            called_at: Utc::now(),
        }
    }

    /// Build a record for a call that never produced a result.
    pub fn from_error(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: None,
            error: Some(error.into()),
            called_at: Utc::now(),
        }
    }

    /// Whether the call failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
