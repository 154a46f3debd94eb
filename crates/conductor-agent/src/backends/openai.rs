use super::{Completion, ReasoningBackend, ReasoningOutput, ReasoningRequest};
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use conductor_core::{ConductorError, ConductorResult, ToolCall};
use conductor_skills::{SkillDescriptor, ToolSession};
use tracing::{debug, info, warn};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

/// One parsed assistant turn.
#[derive(Debug)]
pub struct ChatTurn {
    /// Assistant text, if the model answered.
    pub content: Option<String>,
    /// Provider reasoning for this turn.
    pub reasoning: Option<String>,
    /// Tool calls requested in this turn.
    pub tool_calls: Vec<ToolCall>,
    /// The assistant message as returned, replayed verbatim on the next step.
    pub message: serde_json::Value,
}

impl OpenAiBackend {
    /// Create a backend for `config`.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_tools(&self, tools: &[SkillDescriptor]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        let request = if self.config.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        };

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Conductor")
        } else {
            request
        }
    }

    async fn chat(
        &self,
        messages: &[serde_json::Value],
        tools: &[SkillDescriptor],
    ) -> ConductorResult<ChatTurn> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }

        let request = self.add_provider_headers(self.http.post(&url));

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| ConductorError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ConductorError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ConductorError::Http(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_chat_response(&resp_body)
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    async fn complete(&self, system: &str, prompt: &str) -> ConductorResult<Completion> {
        let messages = [
            serde_json::json!({"role": "system", "content": system}),
            serde_json::json!({"role": "user", "content": prompt}),
        ];
        let turn = self.chat(&messages, &[]).await?;
        Ok(Completion {
            text: turn.content.unwrap_or_default(),
            reasoning: turn.reasoning,
        })
    }

    async fn execute_with_tools(
        &self,
        request: &ReasoningRequest,
        tools: &dyn ToolSession,
    ) -> ConductorResult<ReasoningOutput> {
        let mut messages = vec![
            serde_json::json!({"role": "system", "content": request.instructions}),
            serde_json::json!({"role": "user", "content": request.prompt}),
        ];
        let mut reasoning: Vec<String> = Vec::new();

        for step in 1..=request.max_steps {
            debug!(step, model = %self.config.model_id, "Reasoning step");
            let turn = self.chat(&messages, tools.descriptors()).await?;
            if let Some(r) = turn.reasoning {
                reasoning.push(r);
            }

            if turn.tool_calls.is_empty() {
                info!(steps = step, "Reasoning loop completed");
                return Ok(ReasoningOutput {
                    text: turn.content.unwrap_or_default(),
                    reasoning: if reasoning.is_empty() {
                        None
                    } else {
                        Some(reasoning.join("\n\n"))
                    },
                    steps: step,
                });
            }

            messages.push(turn.message);
            for call in turn.tool_calls {
                let call_id = call.id.clone();
                let tool = call.name.clone();
                let content = match tools.call(call).await {
                    Ok(result) => result.content,
                    Err(e) => {
                        warn!(tool = %tool, error = %e, "Tool execution failed");
                        format!("Tool error: {e}")
                    }
                };
                messages.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": content,
                }));
            }
        }

        warn!(max_steps = request.max_steps, "Reasoning loop reached max steps");
        Err(ConductorError::Agent(format!(
            "Reasoning loop exceeded maximum of {} tool steps",
            request.max_steps
        )))
    }
}

/// Parse a non-streaming chat-completions response body.
pub fn parse_chat_response(body: &serde_json::Value) -> ConductorResult<ChatTurn> {
    let message = body["choices"][0]["message"].clone();
    if !message.is_object() {
        return Err(ConductorError::Http(format!(
            "Malformed chat response: {body}"
        )));
    }

    let content = message["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let reasoning = message["reasoning_content"]
        .as_str()
        .or_else(|| message["reasoning"].as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let id = tc["id"].as_str()?.to_string();
                    let name = tc["function"]["name"].as_str()?.to_string();
                    let arguments: serde_json::Value =
                        serde_json::from_str(tc["function"]["arguments"].as_str().unwrap_or("{}"))
                            .unwrap_or_default();
                    Some(ToolCall {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatTurn {
        content,
        reasoning,
        tool_calls,
        message,
    })
}
