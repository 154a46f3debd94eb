use conductor_agent::ModelConfig;
use conductor_core::{Agent, Job};
use conductor_orchestrator::OrchestratorConfig;
use conductor_skills::SkillRegistry;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `[model].api_key` is empty.
pub const API_KEY_ENV: &str = "CONDUCTOR_API_KEY";

/// Contents of `conductor.toml`.
#[derive(Debug, Deserialize)]
pub struct ConductorConfig {
    /// Backend used for decomposition and task execution.
    pub model: ModelConfig,
    /// Root for persisted jobs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl ConductorConfig {
    /// Read and parse `path`, then fill the API key from the environment.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {e}", path.display())
        })?;
        let mut config: ConductorConfig = toml::from_str(&raw)?;
        if config.model.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                config.model.api_key = key;
            }
        }
        Ok(config)
    }

    /// Directory of the file job store.
    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }
}

/// A job definition as written by hand.
#[derive(Debug, Deserialize)]
pub struct JobFile {
    pub title: String,
    pub goal: String,
    /// Owner of the job.
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub agents: Vec<AgentFile>,
}

/// One `[[agents]]` entry.
#[derive(Debug, Deserialize)]
pub struct AgentFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instructions: String,
    #[serde(default)]
    /// Tool ids from the registry.
    pub tools: Vec<String>,
}

fn default_user() -> String {
    "local".to_string()
}

impl JobFile {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read job file '{}': {e}", path.display()))?;
        Ok(toml::from_str(&raw)?)
    }

    /// Build a pending job, rejecting tools the registry does not know.
    pub fn into_job(self, registry: &SkillRegistry) -> anyhow::Result<Job> {
        if self.goal.trim().is_empty() {
            anyhow::bail!("Job goal must not be empty");
        }
        let mut agents = Vec::with_capacity(self.agents.len());
        for entry in self.agents {
            if let Some(unknown) = entry.tools.iter().find(|t| registry.get(t).is_none()) {
                anyhow::bail!("Agent '{}' uses unknown tool '{unknown}'", entry.name);
            }
            agents.push(
                Agent::new(entry.name, entry.instructions)
                    .with_description(entry.description)
                    .with_tools(entry.tools),
            );
        }
        Ok(Job::new(self.user, self.title, self.goal).with_agents(agents))
    }
}
