use conductor_core::Agent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Whether an agent is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// No task in progress.
    Idle,
    /// Running a task.
    Working,
}

/// Counters accumulated over the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Attempts started.
    pub attempts: u32,
    /// Attempts that did not complete.
    pub failed_attempts: u32,
    /// Tool calls made.
    pub tool_calls: u32,
    /// Tasks of this agent that exhausted their retries.
    pub errors: u32,
    /// Time spent in attempts.
    pub duration_ms: u64,
}

/// Live view of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Agent id.
    pub agent_id: Uuid,
    /// Agent name.
    pub name: String,
    /// Task in progress, if any.
    pub current_task: Option<Uuid>,
    /// Busy or idle.
    pub status: WorkerStatus,
    /// Counters.
    pub metrics: AgentMetrics,
}

/// Tracks state and metrics for every agent the run loop has dispatched to.
pub struct AgentMonitor {
    states: Arc<RwLock<HashMap<Uuid, AgentState>>>,
}

impl AgentMonitor {
    /// Empty monitor.
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mark an agent as working on a task.
    pub async fn start_task(&self, agent: &Agent, task_id: Uuid) {
        let mut states = self.states.write().await;
        let state = states.entry(agent.id).or_insert_with(|| AgentState {
            agent_id: agent.id,
            name: agent.name.clone(),
            current_task: None,
            status: WorkerStatus::Idle,
            metrics: AgentMetrics::default(),
        });
        state.current_task = Some(task_id);
        state.status = WorkerStatus::Working;
    }

    /// Mark an agent as idle.
    pub async fn finish_task(&self, agent_id: Uuid) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&agent_id) {
            state.current_task = None;
            state.status = WorkerStatus::Idle;
        }
    }

    /// Record one finished attempt.
    pub async fn record_attempt(
        &self,
        agent_id: Uuid,
        tool_calls: usize,
        duration_ms: u64,
        success: bool,
    ) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&agent_id) {
            state.metrics.attempts += 1;
            state.metrics.tool_calls += u32::try_from(tool_calls).unwrap_or(u32::MAX);
            state.metrics.duration_ms += duration_ms;
            if !success {
                state.metrics.failed_attempts += 1;
            }
        }
    }

    /// Record a task that failed for good.
    pub async fn record_error(&self, agent_id: Uuid) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&agent_id) {
            state.metrics.errors += 1;
        }
    }

    /// All agents, sorted by name.
    pub async fn snapshot(&self) -> Vec<AgentState> {
        let states = self.states.read().await;
        let mut all: Vec<AgentState> = states.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// State of one agent.
    pub async fn get_state(&self, agent_id: Uuid) -> Option<AgentState> {
        self.states.read().await.get(&agent_id).cloned()
    }

    /// Counters summed over all agents.
    pub async fn aggregate_metrics(&self) -> AgentMetrics {
        let states = self.states.read().await;
        let mut total = AgentMetrics::default();
        for state in states.values() {
            total.attempts += state.metrics.attempts;
            total.failed_attempts += state.metrics.failed_attempts;
            total.tool_calls += state.metrics.tool_calls;
            total.errors += state.metrics.errors;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    /// Snapshot and totals as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let agents = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "agents": agents,
            "aggregate": aggregate,
        })
    }
}

impl Default for AgentMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_finish_task() {
        let monitor = AgentMonitor::new();
        let agent = Agent::new("Coder", "Write code");
        let task_id = Uuid::new_v4();

        monitor.start_task(&agent, task_id).await;
        let state = monitor.get_state(agent.id).await.unwrap();
        assert_eq!(state.status, WorkerStatus::Working);
        assert_eq!(state.current_task, Some(task_id));

        monitor.finish_task(agent.id).await;
        let state = monitor.get_state(agent.id).await.unwrap();
        assert_eq!(state.status, WorkerStatus::Idle);
        assert!(state.current_task.is_none());
    }

    #[tokio::test]
    async fn test_unknown_agent_is_ignored() {
        let monitor = AgentMonitor::new();
        monitor.record_attempt(Uuid::new_v4(), 1, 10, true).await;
        assert!(monitor.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_metrics() {
        let monitor = AgentMonitor::new();
        let coder = Agent::new("Coder", "");
        let tester = Agent::new("Tester", "");
        monitor.start_task(&coder, Uuid::new_v4()).await;
        monitor.start_task(&tester, Uuid::new_v4()).await;
        monitor.record_attempt(coder.id, 3, 1000, true).await;
        monitor.record_attempt(tester.id, 2, 500, false).await;
        monitor.record_error(tester.id).await;

        let agg = monitor.aggregate_metrics().await;
        assert_eq!(agg.attempts, 2);
        assert_eq!(agg.failed_attempts, 1);
        assert_eq!(agg.tool_calls, 5);
        assert_eq!(agg.errors, 1);
        assert_eq!(agg.duration_ms, 1500);

        let json = monitor.to_json().await;
        assert_eq!(json["agents"][0]["name"], "Coder");
        assert!(json["aggregate"].is_object());
    }
}
