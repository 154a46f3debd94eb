use crate::tool::ToolCallRecord;
use crate::{ConductorError, ConductorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in a job's execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to run, or waiting for a retry.
    Pending,
    /// An attempt is in progress.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished without success.
    Failed,
    /// Not run.
    Skipped,
}

impl TaskStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    /// Whether `self -> to` is an edge of the task state machine.
    ///
    /// `running -> pending` is the retry edge. A pending task may be failed
    /// or skipped without running when it cannot be dispatched.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Running, Pending)
                | (Running, Completed | Failed | Skipped)
                | (Pending, Failed | Skipped)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single [`Attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// In progress.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// The reasoning backend did not answer within the configured timeout.
    TimedOut,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Running => write!(f, "running"),
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Failed => write!(f, "failed"),
            AttemptStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// One execution try of a task. Attempts are never deleted and form the
/// task's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based, contiguous per task.
    pub number: u32,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, once finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome.
    pub status: AttemptStatus,
    /// Reasoning trace, if any.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Final answer on success.
    #[serde(default)]
    pub response: Option<String>,
    /// Tool calls made during the attempt.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Failure message.
    #[serde(default)]
    pub error: Option<String>,
}

impl Attempt {
    /// Begin attempt `number`.
    pub fn start(number: u32) -> Self {
        Self {
            number,
            started_at: Utc::now(),
            completed_at: None,
            status: AttemptStatus::Running,
            reasoning: None,
            response: None,
            tool_calls: Vec::new(),
            error: None,
        }
    }

    /// Mark the attempt completed.
    pub fn complete(&mut self, response: impl Into<String>, reasoning: Option<String>) {
        self.response = Some(response.into());
        self.reasoning = reasoning;
        self.finish(AttemptStatus::Completed);
    }

    /// Mark the attempt failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(AttemptStatus::Failed);
    }

    /// Mark the attempt timed out.
    pub fn time_out(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(AttemptStatus::TimedOut);
    }

    fn finish(&mut self, status: AttemptStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Whether the attempt completed.
    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    /// Wall-clock duration in milliseconds, once finished.
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at.map(|end| {
            u64::try_from((end - self.started_at).num_milliseconds()).unwrap_or_default()
        })
    }
}

/// One atomic unit of work within a job, assigned to exactly one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id.
    pub id: Uuid,
    /// Owning job.
    pub job_id: Uuid,
    /// Assigned agent.
    pub agent_id: Uuid,
    /// Short title.
    pub title: String,
    /// What the agent should do.
    pub description: String,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Execution order, unique within the job.
    pub order: u32,
    /// Attempts in order.
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

impl Task {
    /// New `pending` task.
    pub fn new(
        job_id: Uuid,
        agent_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            agent_id,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            order,
            attempts: Vec::new(),
        }
    }

    /// Move to `to` if the state machine allows it.
    pub fn transition(&mut self, to: TaskStatus) -> ConductorResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(ConductorError::InvalidTransition {
                entity: "task",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Number the next attempt will carry.
    pub fn next_attempt_number(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX).saturating_add(1)
    }

    /// Record a finished or in-flight attempt.
    ///
    /// Attempt numbers must be contiguous, and only the newest attempt may
    /// still be running.
    pub fn record_attempt(&mut self, attempt: Attempt) -> ConductorResult<()> {
        let expected = self.next_attempt_number();
        if attempt.number != expected {
            return Err(ConductorError::Orchestrator(format!(
                "task {}: expected attempt {expected}, got {}",
                self.id, attempt.number
            )));
        }
        if self
            .attempts
            .last()
            .is_some_and(|a| a.status == AttemptStatus::Running)
        {
            return Err(ConductorError::Orchestrator(format!(
                "task {}: attempt {} is still running",
                self.id,
                expected - 1
            )));
        }
        self.attempts.push(attempt);
        Ok(())
    }

    /// Most recent attempt.
    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// The completed attempt, if any.
    pub fn successful_attempt(&self) -> Option<&Attempt> {
        self.attempts.iter().rev().find(|a| a.is_success())
    }
}

/// Partial update applied to a stored task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New status.
    pub status: Option<TaskStatus>,
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
}

impl TaskUpdate {
    /// Update that only changes the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Apply the set fields to `task`. Status changes are not validated here;
    /// callers move tasks through [`Task::transition`] first.
    pub fn apply(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
    }
}
