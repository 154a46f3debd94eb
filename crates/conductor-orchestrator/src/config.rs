use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the run loop does with a task whose agent is not on the job roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAgentPolicy {
    /// Fail the task and continue with the next one.
    #[default]
    Skip,
    /// Fail the task and the job.
    FailJob,
}

/// Run-loop settings. Every field has a default, so an empty
/// `[orchestrator]` table is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Attempt budget and backoff.
    #[serde(flatten)]
    pub retry: RetryPolicy,
    /// Bound on each executor invocation. Unset means no bound.
    pub task_timeout_secs: Option<u64>,
    /// What to do with tasks whose agent is gone.
    pub missing_agent: MissingAgentPolicy,
}

impl OrchestratorConfig {
    /// Per-invocation timeout, if configured.
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_uses_defaults() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.missing_agent, MissingAgentPolicy::Skip);
        assert!(config.task_timeout().is_none());
    }

    #[test]
    fn test_partial_override() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            max_attempts = 5
            base_delay_ms = 250
            task_timeout_secs = 90
            missing_agent = "fail_job"
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 250);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert_eq!(config.task_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.missing_agent, MissingAgentPolicy::FailJob);
    }
}
