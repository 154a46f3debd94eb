use crate::config::OrchestratorConfig;
use crate::engine::{ensure_runnable, Orchestrator, RunOutcome};
use crate::events::{EventBus, EventKind, JobEvent, Subscription};
use crate::monitor::AgentMonitor;
use crate::run_state::RunRegistry;
use conductor_agent::{
    DecompositionPlan, Decomposer, GoalDecomposer, LlmDecomposer, ReasoningBackend, TaskExecutor,
};
use conductor_core::{ConductorError, ConductorResult, Job, JobStatus, Task};
use conductor_skills::ToolProvider;
use conductor_store::JobStore;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of a successful decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionSummary {
    /// Number of tasks saved.
    pub task_count: usize,
    /// Planner reasoning, if any.
    pub reasoning: Option<String>,
}

/// Process-wide entry point: decomposition, run control and event
/// subscription for every job.
pub struct OrchestratorManager {
    store: Arc<dyn JobStore>,
    decomposer: GoalDecomposer,
    orchestrator: Arc<Orchestrator>,
    runs: Arc<RunRegistry>,
    bus: EventBus,
}

impl OrchestratorManager {
    /// Build a manager whose decomposer asks `backend` for a JSON plan.
    pub fn new(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn ReasoningBackend>,
        tools: Arc<dyn ToolProvider>,
        config: &OrchestratorConfig,
    ) -> Self {
        let decomposer = Arc::new(LlmDecomposer::new(Arc::clone(&backend)));
        Self::with_decomposer(store, backend, tools, decomposer, config)
    }

    /// Build a manager with a custom decomposition collaborator.
    pub fn with_decomposer(
        store: Arc<dyn JobStore>,
        backend: Arc<dyn ReasoningBackend>,
        tools: Arc<dyn ToolProvider>,
        decomposer: Arc<dyn Decomposer>,
        config: &OrchestratorConfig,
    ) -> Self {
        let mut executor = TaskExecutor::new(backend, tools);
        if let Some(timeout) = config.task_timeout() {
            executor = executor.with_timeout(timeout);
        }
        let runs = Arc::new(RunRegistry::new());
        let bus = EventBus::new();
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            executor,
            bus.clone(),
            Arc::clone(&runs),
        )
        .with_config(config);

        Self {
            store,
            decomposer: GoalDecomposer::new(decomposer),
            orchestrator: Arc::new(orchestrator),
            runs,
            bus,
        }
    }

    /// Persistence collaborator.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Per-agent metrics.
    pub fn monitor(&self) -> &Arc<AgentMonitor> {
        self.orchestrator.monitor()
    }

    /// Decompose the job's goal into tasks and move it to `ready`.
    ///
    /// Requires a `pending` job with at least one agent. On failure the job
    /// is marked `failed` and `analysis_failed` then `job_failed` are emitted.
    pub async fn start_decomposition(&self, job_id: Uuid) -> ConductorResult<DecompositionSummary> {
        let mut job = self.store.load_job(job_id).await?;
        if job.agents.is_empty() {
            return Err(ConductorError::Config(format!(
                "Job {job_id} has no agents assigned"
            )));
        }
        if self.runs.is_running(job_id) {
            return Err(ConductorError::AlreadyRunning(job_id));
        }
        job.transition(JobStatus::Analyzing)?;
        self.store
            .update_job_status(job_id, JobStatus::Analyzing)
            .await?;
        info!(job_id = %job_id, agents = job.agents.len(), "Decomposition started");
        self.emit(job_id, EventKind::AnalysisStarted);

        match self.plan_and_save(&job).await {
            Ok(plan) => {
                job.transition(JobStatus::Ready)?;
                self.store.update_job_status(job_id, JobStatus::Ready).await?;
                let task_count = plan.tasks.len();
                info!(job_id = %job_id, task_count, "Decomposition completed");
                self.emit(job_id, EventKind::AnalysisCompleted { task_count });
                Ok(DecompositionSummary {
                    task_count,
                    reasoning: plan.reasoning,
                })
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Decomposition failed");
                if let Err(store_err) = self.store.update_job_status(job_id, JobStatus::Failed).await
                {
                    warn!(job_id = %job_id, error = %store_err, "Failed to persist job failure");
                }
                let message = e.to_string();
                self.emit(
                    job_id,
                    EventKind::AnalysisFailed {
                        error: message.clone(),
                    },
                );
                self.emit(job_id, EventKind::JobFailed { error: message });
                Err(e)
            }
        }
    }

    async fn plan_and_save(&self, job: &Job) -> ConductorResult<DecompositionPlan> {
        let plan = self.decomposer.decompose(&job.goal, &job.agents).await?;
        let tasks: Vec<Task> = plan
            .tasks
            .iter()
            .map(|p| Task::new(job.id, p.agent_id, &p.title, &p.description, p.order))
            .collect();
        self.store.save_tasks(job.id, tasks).await?;
        Ok(plan)
    }

    /// Start a run in the background and return immediately.
    ///
    /// The run state is registered before the task is spawned, so
    /// [`is_running`](Self::is_running) is true as soon as this returns.
    /// The handle may be dropped; awaiting it yields the outcome.
    pub async fn start_run(
        &self,
        job_id: Uuid,
        user_id: &str,
    ) -> ConductorResult<JoinHandle<RunOutcome>> {
        let job = self.store.load_job(job_id).await?;
        if job.user_id != user_id {
            return Err(ConductorError::Forbidden(format!(
                "Job {job_id} does not belong to user {user_id}"
            )));
        }
        if self.runs.is_running(job_id) {
            return Err(ConductorError::AlreadyRunning(job_id));
        }
        ensure_runnable(&job)?;
        if job.tasks.is_empty() {
            return Err(ConductorError::Config(format!("Job {job_id} has no tasks")));
        }

        let guard = self.runs.register(job_id)?;
        let orchestrator = Arc::clone(&self.orchestrator);
        info!(job_id = %job_id, user_id = %user_id, "Run scheduled");

        Ok(tokio::spawn(async move {
            let run = AssertUnwindSafe(orchestrator.run_registered(guard)).catch_unwind();
            match run.await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(job_id = %job_id, "Run panicked");
                    let err = ConductorError::Orchestrator("run panicked".into());
                    orchestrator.fail_after_error(job_id, &err).await;
                    RunOutcome::Failed
                }
            }
        }))
    }

    /// Ask a running job to pause at the next task boundary.
    pub fn pause_run(&self, job_id: Uuid) -> bool {
        self.runs.pause(job_id)
    }

    /// Wake a paused run.
    pub fn resume_run(&self, job_id: Uuid) -> bool {
        self.runs.resume(job_id)
    }

    /// Ask a run to stop. A paused run stops at once.
    pub fn cancel_run(&self, job_id: Uuid) -> bool {
        self.runs.cancel(job_id)
    }

    /// Whether a run is active for `job_id`.
    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.runs.is_running(job_id)
    }

    /// Register `on_event` for the job's events until the subscription drops.
    pub fn subscribe_events<F>(&self, job_id: Uuid, on_event: F) -> Subscription
    where
        F: Fn(&JobEvent) -> ConductorResult<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(job_id, on_event)
    }

    /// Receive events of `job_id` on a channel, for transports.
    pub fn subscribe_channel(
        &self,
        job_id: Uuid,
    ) -> (mpsc::UnboundedReceiver<JobEvent>, Subscription) {
        self.bus.subscribe_channel(job_id)
    }

    fn emit(&self, job_id: Uuid, kind: EventKind) {
        self.bus.publish(JobEvent::new(job_id, kind));
    }
}
