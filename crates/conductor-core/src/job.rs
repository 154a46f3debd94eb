use crate::agent::Agent;
use crate::task::Task;
use crate::{ConductorError, ConductorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a [`Job`].
///
/// ```text
/// pending -> analyzing -> ready -> running <-> paused -> completed
///    \           \          \        \           \
///     +-----------+----------+--------+-----------+--> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet decomposed.
    Pending,
    /// Goal decomposition in progress.
    Analyzing,
    /// Tasks are persisted and the job can be run.
    Ready,
    /// A run loop is executing tasks.
    Running,
    /// The run loop is blocked waiting for resume or cancel.
    Paused,
    /// Every task finished. Terminal.
    Completed,
    /// Decomposition failed, a task exhausted its retries, or the run was
    /// cancelled. Terminal.
    Failed,
}

impl JobStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Ready => "ready",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> to` is an edge of the job state machine.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Analyzing)
                | (Analyzing, Ready)
                | (Ready, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Pending | Analyzing | Ready | Running | Paused, Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated, goal-driven unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique id.
    pub id: Uuid,
    /// Identifier of the owning user, as issued by the embedding application.
    pub user_id: String,
    /// Short title.
    pub title: String,
    /// The user goal to decompose.
    pub goal: String,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Agents assigned at creation. Order is significant for prompts.
    #[serde(default)]
    pub agents: Vec<Agent>,
    /// Tasks produced by decomposition.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// New `pending` job with no agents or tasks.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        goal: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            goal: goal.into(),
            status: JobStatus::Pending,
            agents: Vec::new(),
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign the agent roster.
    pub fn with_agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = agents;
        self
    }

    /// Look up an assigned agent by id.
    pub fn agent(&self, id: Uuid) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Tasks sorted by execution order.
    pub fn ordered_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by_key(|t| t.order);
        tasks
    }

    /// Mutable lookup of a task by id.
    pub fn task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Move to `to`, rejecting edges outside the state machine.
    ///
    /// On rejection the status is left unchanged.
    pub fn transition(&mut self, to: JobStatus) -> ConductorResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(ConductorError::InvalidTransition {
                entity: "job",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
