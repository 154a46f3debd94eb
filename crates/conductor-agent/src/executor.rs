use crate::backends::{ReasoningBackend, ReasoningRequest};
use async_trait::async_trait;
use conductor_core::{
    Agent, Attempt, ConductorError, ConductorResult, Job, Task, ToolCall, ToolCallRecord,
    ToolResult,
};
use conductor_skills::{SkillDescriptor, ToolProvider, ToolSession};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on tool round-trips within one attempt.
pub const MAX_TOOL_STEPS: u32 = 10;

/// Invoked synchronously for every tool call, as it happens.
pub type ToolCallObserver = Arc<dyn Fn(&ToolCallRecord) + Send + Sync>;

/// Successful output of an earlier task, fed into later prompts.
#[derive(Debug, Clone)]
pub struct PriorResult {
    /// Title of the earlier task.
    pub task_title: String,
    /// Its successful attempt.
    pub attempt: Attempt,
}

/// Everything the executor needs for one attempt.
pub struct ExecutionRequest<'a> {
    /// Owning job.
    pub job: &'a Job,
    /// Task to attempt.
    pub task: &'a Task,
    /// Agent assigned to the task.
    pub agent: &'a Agent,
    /// Successful prior tasks in execution order.
    pub prior: &'a [PriorResult],
    /// Number recorded on the attempt.
    pub attempt_number: u32,
    /// Receives each tool call as it completes.
    pub on_tool_call: Option<ToolCallObserver>,
}

/// Outcome of one attempt. Failures never surface as `Err`; they are
/// folded into the attempt record.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    /// The finished attempt record.
    pub attempt: Attempt,
    /// Whether the attempt completed.
    pub success: bool,
}

/// Runs a single task attempt for a single agent.
pub struct TaskExecutor {
    backend: Arc<dyn ReasoningBackend>,
    tools: Arc<dyn ToolProvider>,
    timeout: Option<Duration>,
    max_steps: u32,
}

impl TaskExecutor {
    /// Executor with no timeout and the default step limit.
    pub fn new(backend: Arc<dyn ReasoningBackend>, tools: Arc<dyn ToolProvider>) -> Self {
        Self {
            backend,
            tools,
            timeout: None,
            max_steps: MAX_TOOL_STEPS,
        }
    }

    /// Bound each attempt by `timeout`. Expiry yields a `timed_out` attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the tool step limit.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Execute one attempt. The tool session is closed on every path,
    /// including a panicking backend.
    pub async fn execute(&self, req: ExecutionRequest<'_>) -> TaskExecution {
        let mut attempt = Attempt::start(req.attempt_number);
        info!(
            job_id = %req.job.id,
            task_id = %req.task.id,
            agent = %req.agent.name,
            attempt = req.attempt_number,
            "Executing task attempt"
        );

        let session = match self.tools.open(&req.agent.tool_ids).await {
            Ok(s) => s,
            Err(e) => {
                warn!(task_id = %req.task.id, error = %e, "Failed to open tool session");
                attempt.fail(format!("Failed to open tools: {e}"));
                return TaskExecution {
                    attempt,
                    success: false,
                };
            }
        };

        let recording = RecordingSession {
            inner: session.as_ref(),
            records: Mutex::new(Vec::new()),
            observer: req.on_tool_call.clone(),
        };

        let request = ReasoningRequest {
            instructions: system_prompt(req.agent),
            prompt: build_prompt(req.job, req.task, req.prior),
            max_steps: self.max_steps,
        };

        let invocation = async {
            match self.timeout {
                Some(limit) => {
                    match tokio::time::timeout(
                        limit,
                        self.backend.execute_with_tools(&request, &recording),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ConductorError::Timeout(format!(
                            "timed out after {limit:?}"
                        ))),
                    }
                }
                None => self.backend.execute_with_tools(&request, &recording).await,
            }
        };
        let outcome = AssertUnwindSafe(invocation).catch_unwind().await;

        attempt.tool_calls = recording.into_records();
        if let Err(e) = session.close().await {
            warn!(task_id = %req.task.id, error = %e, "Failed to close tool session");
        }

        // The session is released; let the caller see the panic.
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        match outcome {
            Ok(output) => attempt.complete(output.text, output.reasoning),
            Err(ConductorError::Timeout(msg)) => attempt.time_out(msg),
            Err(e) => attempt.fail(e.to_string()),
        }

        let success = attempt.is_success();
        info!(
            task_id = %req.task.id,
            attempt = attempt.number,
            status = %attempt.status,
            tool_calls = attempt.tool_calls.len(),
            "Task attempt finished"
        );
        TaskExecution { attempt, success }
    }
}

fn system_prompt(agent: &Agent) -> String {
    if agent.instructions.trim().is_empty() {
        format!("You are {}.", agent.name)
    } else {
        agent.instructions.clone()
    }
}

fn build_prompt(job: &Job, task: &Task, prior: &[PriorResult]) -> String {
    let mut prompt = format!("## Goal\n{}\n\n", job.goal);

    if !prior.is_empty() {
        prompt.push_str("## Previous results\n");
        for p in prior {
            let response = p.attempt.response.as_deref().unwrap_or_default();
            prompt.push_str(&format!("### {}\n{}\n\n", p.task_title, response));
        }
    }

    prompt.push_str(&format!("## Your task\n{}\n", task.title));
    if !task.description.is_empty() {
        prompt.push_str(&format!("\n{}\n", task.description));
    }
    prompt
}

/// Wraps a session and records every call, including failed ones.
struct RecordingSession<'a> {
    inner: &'a dyn ToolSession,
    records: Mutex<Vec<ToolCallRecord>>,
    observer: Option<ToolCallObserver>,
}

impl RecordingSession<'_> {
    fn push(&self, record: ToolCallRecord) {
        if let Some(observer) = &self.observer {
            observer(&record);
        }
        self.records.lock().push(record);
    }

    fn into_records(self) -> Vec<ToolCallRecord> {
        self.records.into_inner()
    }
}

#[async_trait]
impl ToolSession for RecordingSession<'_> {
    fn descriptors(&self) -> &[SkillDescriptor] {
        self.inner.descriptors()
    }

    async fn call(&self, call: ToolCall) -> ConductorResult<ToolResult> {
        let pending = call.clone();
        match self.inner.call(call).await {
            Ok(result) => {
                self.push(ToolCallRecord::from_result(&pending, &result));
                Ok(result)
            }
            Err(e) => {
                self.push(ToolCallRecord::from_error(&pending, e.to_string()));
                Err(e)
            }
        }
    }

    async fn close(&self) -> ConductorResult<()> {
        // The owning executor closes the real session.
        Ok(())
    }
}
