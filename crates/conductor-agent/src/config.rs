use serde::{Deserialize, Serialize};

/// Supported providers. All of them speak the OpenAI chat-completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI itself.
    OpenAi,
    /// OpenRouter gateway.
    OpenRouter,
    /// Groq cloud inference.
    Groq,
    /// Local Ollama server. No API key needed.
    Ollama,
}

/// Model selection and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which API to talk to.
    pub provider: LlmProvider,
    /// Provider-specific model name.
    pub model_id: String,
    /// May be left empty in config files and supplied from the environment.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default endpoint.
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token limit per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// Endpoint root, without the `/v1` suffix.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Ollama => "http://localhost:11434",
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serialization() {
        assert_eq!(serde_json::to_string(&LlmProvider::OpenAi).unwrap(), "\"openai\"");
        let parsed: LlmProvider = serde_json::from_str("\"openrouter\"").unwrap();
        assert_eq!(parsed, LlmProvider::OpenRouter);
    }

    #[test]
    fn test_deserialization_with_defaults() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "groq"
            model_id = "llama-3.3-70b"
            "#,
        )
        .unwrap();
        assert!(config.api_key.is_empty());
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.base_url(), "https://api.groq.com/openai");
    }

    #[test]
    fn test_base_url_override() {
        let config = ModelConfig {
            provider: LlmProvider::OpenAi,
            model_id: "gpt-4o-mini".into(),
            api_key: "key".into(),
            api_base_url: Some("http://localhost:8080".into()),
            temperature: 0.0,
            max_tokens: 512,
        };
        assert_eq!(config.base_url(), "http://localhost:8080");
    }
}
