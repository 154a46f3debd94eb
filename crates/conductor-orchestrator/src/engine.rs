use crate::config::{MissingAgentPolicy, OrchestratorConfig};
use crate::events::{EventBus, EventKind, JobEvent};
use crate::monitor::AgentMonitor;
use crate::retry::RetryPolicy;
use crate::run_state::{RunGuard, RunRegistry, RunStatus};
use conductor_agent::{ExecutionRequest, PriorResult, TaskExecutor, ToolCallObserver};
use conductor_core::{
    Agent, Attempt, ConductorError, ConductorResult, Job, JobStatus, Task, TaskStatus, TaskUpdate,
    ToolCallRecord,
};
use conductor_store::JobStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task finished.
    Completed,
    /// A task exhausted its retries or the run hit an error.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

enum TaskOutcome {
    Completed(Attempt),
    Stopped(RunOutcome),
}

/// The sequential run loop.
///
/// Executes a job's tasks in ascending order, retrying failures with
/// backoff and honouring pause/resume/cancel at task boundaries. Every run
/// ends with exactly one of `job_completed`, `job_failed` or
/// `job_cancelled`.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    executor: Arc<TaskExecutor>,
    bus: EventBus,
    runs: Arc<RunRegistry>,
    monitor: Arc<AgentMonitor>,
    retry: RetryPolicy,
    missing_agent: MissingAgentPolicy,
}

impl Orchestrator {
    /// Orchestrator with default retry and missing-agent settings.
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: TaskExecutor,
        bus: EventBus,
        runs: Arc<RunRegistry>,
    ) -> Self {
        Self {
            store,
            executor: Arc::new(executor),
            bus,
            runs,
            monitor: Arc::new(AgentMonitor::new()),
            retry: RetryPolicy::default(),
            missing_agent: MissingAgentPolicy::default(),
        }
    }

    /// Apply retry and missing-agent settings. The task timeout belongs to
    /// the executor.
    pub fn with_config(mut self, config: &OrchestratorConfig) -> Self {
        self.retry = config.retry.clone();
        self.missing_agent = config.missing_agent;
        self
    }

    /// Share an existing monitor.
    pub fn with_monitor(mut self, monitor: Arc<AgentMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Per-agent metrics.
    pub fn monitor(&self) -> &Arc<AgentMonitor> {
        &self.monitor
    }

    /// Event bus used for this run loop.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Live run registry.
    pub fn runs(&self) -> &Arc<RunRegistry> {
        &self.runs
    }

    /// Register and execute a run for `job_id`, returning when it ends.
    ///
    /// Fails without side effects if the job is not runnable or a run is
    /// already active.
    pub async fn run(&self, job_id: Uuid) -> ConductorResult<RunOutcome> {
        let job = self.store.load_job(job_id).await?;
        ensure_runnable(&job)?;
        let guard = self.runs.register(job_id)?;
        Ok(self.run_registered(guard).await)
    }

    /// Execute a run whose state the caller already registered.
    pub async fn run_registered(&self, guard: RunGuard) -> RunOutcome {
        let job_id = guard.job_id();
        let outcome = match self.run_inner(job_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Run aborted");
                self.fail_after_error(job_id, &e).await;
                RunOutcome::Failed
            }
        };
        drop(guard);
        outcome
    }

    async fn run_inner(&self, job_id: Uuid) -> ConductorResult<RunOutcome> {
        let mut job = self.store.load_job(job_id).await?;
        let mut tasks: Vec<Task> = job.ordered_tasks().into_iter().cloned().collect();

        if tasks.is_empty() {
            if job.status != JobStatus::Running {
                self.set_job_status(&mut job, JobStatus::Running).await?;
            }
            self.set_job_status(&mut job, JobStatus::Completed).await?;
            info!(job_id = %job_id, "Run completed with no tasks");
            self.emit(job_id, EventKind::JobCompleted);
            return Ok(RunOutcome::Completed);
        }

        self.set_job_status(&mut job, JobStatus::Running).await?;
        info!(job_id = %job_id, tasks = tasks.len(), "Run started");
        self.emit(job_id, EventKind::JobStarted);

        let mut prior: Vec<PriorResult> = Vec::new();
        for (index, task) in tasks.iter_mut().enumerate() {
            if task.status == TaskStatus::Completed {
                if let Some(attempt) = task.successful_attempt() {
                    prior.push(PriorResult {
                        task_title: task.title.clone(),
                        attempt: attempt.clone(),
                    });
                }
                debug!(job_id = %job_id, task_id = %task.id, "Skipping completed task");
                continue;
            }
            if task.status.is_terminal() {
                debug!(job_id = %job_id, task_id = %task.id, status = %task.status, "Skipping finished task");
                continue;
            }

            self.runs.set_current_task(job_id, index);
            if let Some(outcome) = self.checkpoint(&mut job).await? {
                return Ok(outcome);
            }

            let Some(agent) = job.agent(task.agent_id).cloned() else {
                match self.fail_missing_agent(&mut job, task).await? {
                    Some(outcome) => return Ok(outcome),
                    None => continue,
                }
            };

            match self.run_task(&mut job, task, &agent, &prior).await? {
                TaskOutcome::Completed(attempt) => prior.push(PriorResult {
                    task_title: task.title.clone(),
                    attempt,
                }),
                TaskOutcome::Stopped(outcome) => return Ok(outcome),
            }
        }

        self.set_job_status(&mut job, JobStatus::Completed).await?;
        info!(job_id = %job_id, "Run completed");
        self.emit(job_id, EventKind::JobCompleted);
        Ok(RunOutcome::Completed)
    }

    /// Honour pause and cancel requests between tasks.
    async fn checkpoint(&self, job: &mut Job) -> ConductorResult<Option<RunOutcome>> {
        match self.runs.status(job.id) {
            Some(RunStatus::Running) => Ok(None),
            Some(RunStatus::Paused) => {
                self.set_job_status(job, JobStatus::Paused).await?;
                info!(job_id = %job.id, "Run paused");
                self.emit(job.id, EventKind::JobPaused);

                match self.runs.wait_while_paused(job.id).await {
                    RunStatus::Cancelled => self.cancel(job).await.map(Some),
                    _ => {
                        self.set_job_status(job, JobStatus::Running).await?;
                        info!(job_id = %job.id, "Run resumed");
                        self.emit(job.id, EventKind::JobResumed);
                        Ok(None)
                    }
                }
            }
            Some(RunStatus::Cancelled) | None => self.cancel(job).await.map(Some),
        }
    }

    fn cancelled(&self, job_id: Uuid) -> bool {
        matches!(self.runs.status(job_id), Some(RunStatus::Cancelled) | None)
    }

    async fn run_task(
        &self,
        job: &mut Job,
        task: &mut Task,
        agent: &Agent,
        prior: &[PriorResult],
    ) -> ConductorResult<TaskOutcome> {
        if task.status != TaskStatus::Running {
            self.set_task_status(task, TaskStatus::Running).await?;
        }
        info!(
            job_id = %job.id,
            task_id = %task.id,
            order = task.order,
            agent = %agent.name,
            "Task started"
        );
        self.emit(
            job.id,
            EventKind::TaskStarted {
                task_id: task.id,
                title: task.title.clone(),
                agent_id: agent.id,
                order: task.order,
            },
        );
        self.monitor.start_task(agent, task.id).await;
        let result = self.attempt_task(job, task, agent, prior).await;
        self.monitor.finish_task(agent.id).await;
        result
    }

    /// Try the task until it succeeds, runs out of attempts or the run is
    /// cancelled between tries.
    async fn attempt_task(
        &self,
        job: &mut Job,
        task: &mut Task,
        agent: &Agent,
        prior: &[PriorResult],
    ) -> ConductorResult<TaskOutcome> {
        let observer = self.tool_observer(job.id, task.id);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for try_no in 1..=max_attempts {
            if try_no > 1 {
                let delay = self.retry.backoff_before(try_no);
                info!(
                    job_id = %job.id,
                    task_id = %task.id,
                    attempt = try_no,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Retrying task after backoff"
                );
                tokio::time::sleep(delay).await;

                if self.cancelled(job.id) {
                    return self.cancel(job).await.map(TaskOutcome::Stopped);
                }
                self.set_task_status(task, TaskStatus::Running).await?;
            }

            let execution = self
                .executor
                .execute(ExecutionRequest {
                    job: &*job,
                    task: &*task,
                    agent,
                    prior,
                    attempt_number: task.next_attempt_number(),
                    on_tool_call: Some(observer.clone()),
                })
                .await;
            let attempt = execution.attempt;
            let number = attempt.number;
            self.monitor
                .record_attempt(
                    agent.id,
                    attempt.tool_calls.len(),
                    attempt.duration_ms().unwrap_or_default(),
                    execution.success,
                )
                .await;

            if execution.success {
                self.record_attempt(task, attempt.clone(), TaskStatus::Completed)
                    .await?;
                info!(job_id = %job.id, task_id = %task.id, attempt = number, "Task completed");
                self.emit(
                    job.id,
                    EventKind::TaskCompleted {
                        task_id: task.id,
                        attempt: number,
                        response: attempt.response.clone(),
                    },
                );
                return Ok(TaskOutcome::Completed(attempt));
            }

            last_error = attempt
                .error
                .clone()
                .unwrap_or_else(|| format!("attempt {number} failed"));
            let next = if self.retry.allows_retry(try_no) {
                TaskStatus::Pending
            } else {
                TaskStatus::Failed
            };
            warn!(
                job_id = %job.id,
                task_id = %task.id,
                attempt = number,
                status = %attempt.status,
                error = %last_error,
                "Task attempt failed"
            );
            self.record_attempt(task, attempt, next).await?;
        }

        self.monitor.record_error(agent.id).await;
        let attempt = task.last_attempt().map_or(0, |a| a.number);
        error!(job_id = %job.id, task_id = %task.id, attempts = attempt, "Task exhausted its retries");
        self.emit(
            job.id,
            EventKind::TaskFailed {
                task_id: task.id,
                error: last_error.clone(),
                attempt,
            },
        );
        self.fail_job(job, last_error)
            .await
            .map(TaskOutcome::Stopped)
    }

    async fn fail_missing_agent(
        &self,
        job: &mut Job,
        task: &mut Task,
    ) -> ConductorResult<Option<RunOutcome>> {
        let error = format!("Agent {} is not assigned to this job", task.agent_id);
        warn!(job_id = %job.id, task_id = %task.id, agent_id = %task.agent_id, "Task agent missing");
        self.set_task_status(task, TaskStatus::Failed).await?;
        self.emit(
            job.id,
            EventKind::TaskFailed {
                task_id: task.id,
                error: error.clone(),
                attempt: task.last_attempt().map_or(0, |a| a.number),
            },
        );

        match self.missing_agent {
            MissingAgentPolicy::Skip => Ok(None),
            MissingAgentPolicy::FailJob => self.fail_job(job, error).await.map(Some),
        }
    }

    async fn cancel(&self, job: &mut Job) -> ConductorResult<RunOutcome> {
        self.set_job_status(job, JobStatus::Failed).await?;
        info!(job_id = %job.id, "Run cancelled");
        self.emit(job.id, EventKind::JobCancelled);
        Ok(RunOutcome::Cancelled)
    }

    async fn fail_job(&self, job: &mut Job, error: String) -> ConductorResult<RunOutcome> {
        self.set_job_status(job, JobStatus::Failed).await?;
        error!(job_id = %job.id, error = %error, "Run failed");
        self.emit(job.id, EventKind::JobFailed { error });
        Ok(RunOutcome::Failed)
    }

    /// Best-effort failure after an unexpected error, so the run still ends
    /// with a terminal event.
    pub(crate) async fn fail_after_error(&self, job_id: Uuid, err: &ConductorError) {
        match self.store.load_job(job_id).await {
            Ok(job) if !job.status.is_terminal() => {
                if let Err(e) = self.store.update_job_status(job_id, JobStatus::Failed).await {
                    warn!(job_id = %job_id, error = %e, "Failed to persist job failure");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to reload job after error"),
        }
        self.emit(
            job_id,
            EventKind::JobFailed {
                error: err.to_string(),
            },
        );
    }

    async fn set_job_status(&self, job: &mut Job, to: JobStatus) -> ConductorResult<()> {
        let from = job.status;
        job.transition(to)?;
        self.store.update_job_status(job.id, to).await?;
        debug!(job_id = %job.id, from = %from, to = %to, "Job status changed");
        Ok(())
    }

    async fn set_task_status(&self, task: &mut Task, to: TaskStatus) -> ConductorResult<()> {
        task.transition(to)?;
        self.store
            .update_task(task.id, TaskUpdate::status(to))
            .await
    }

    async fn record_attempt(
        &self,
        task: &mut Task,
        attempt: Attempt,
        next: TaskStatus,
    ) -> ConductorResult<()> {
        task.transition(next)?;
        task.record_attempt(attempt.clone())?;
        self.store.append_task_attempt(task.id, attempt, next).await
    }

    fn tool_observer(&self, job_id: Uuid, task_id: Uuid) -> ToolCallObserver {
        let bus = self.bus.clone();
        Arc::new(move |record: &ToolCallRecord| {
            bus.publish(JobEvent::new(
                job_id,
                EventKind::ToolCalled {
                    task_id,
                    record: record.clone(),
                },
            ));
        })
    }

    fn emit(&self, job_id: Uuid, kind: EventKind) {
        self.bus.publish(JobEvent::new(job_id, kind));
    }
}

/// A run may start from `ready`, or from `paused` when a previous run was
/// lost without finishing.
pub fn ensure_runnable(job: &Job) -> ConductorResult<()> {
    match job.status {
        JobStatus::Ready | JobStatus::Paused => Ok(()),
        other => Err(ConductorError::Config(format!(
            "Job {} cannot run from status {other}",
            job.id
        ))),
    }
}
