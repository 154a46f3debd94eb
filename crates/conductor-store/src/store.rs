use async_trait::async_trait;
use chrono::Utc;
use conductor_core::{
    Attempt, ConductorError, ConductorResult, Job, JobStatus, Task, TaskStatus, TaskUpdate,
};
use uuid::Uuid;

/// Persistence collaborator used by the orchestrator and the CLI.
///
/// Unknown job or task ids yield [`ConductorError::NotFound`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job with its agents and tasks.
    async fn create_job(&self, job: &Job) -> ConductorResult<()>;
    /// Load a job by id.
    async fn load_job(&self, id: Uuid) -> ConductorResult<Job>;
    /// All jobs, newest first.
    async fn list_jobs(&self) -> ConductorResult<Vec<Job>>;
    /// Remove a job and its tasks.
    async fn delete_job(&self, id: Uuid) -> ConductorResult<()>;
    /// Record a new job status.
    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> ConductorResult<()>;
    /// Replace the job's task list.
    async fn save_tasks(&self, job_id: Uuid, tasks: Vec<Task>) -> ConductorResult<()>;
    /// Apply a partial update to a task.
    async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> ConductorResult<()>;
    /// Append `attempt` to the task's history and set its status.
    async fn append_task_attempt(
        &self,
        task_id: Uuid,
        attempt: Attempt,
        status: TaskStatus,
    ) -> ConductorResult<()>;
}

pub(crate) fn job_not_found(id: Uuid) -> ConductorError {
    ConductorError::NotFound(format!("job {id}"))
}

pub(crate) fn task_not_found(id: Uuid) -> ConductorError {
    ConductorError::NotFound(format!("task {id}"))
}

pub(crate) fn set_status(job: &mut Job, status: JobStatus) {
    job.status = status;
    job.updated_at = Utc::now();
}

pub(crate) fn replace_tasks(job: &mut Job, mut tasks: Vec<Task>) {
    for task in &mut tasks {
        task.job_id = job.id;
    }
    tasks.sort_by_key(|t| t.order);
    job.tasks = tasks;
    job.updated_at = Utc::now();
}

pub(crate) fn apply_update(job: &mut Job, task_id: Uuid, update: &TaskUpdate) -> ConductorResult<()> {
    let task = job.task_mut(task_id).ok_or_else(|| task_not_found(task_id))?;
    update.apply(task);
    job.updated_at = Utc::now();
    Ok(())
}

pub(crate) fn apply_attempt(
    job: &mut Job,
    task_id: Uuid,
    attempt: Attempt,
    status: TaskStatus,
) -> ConductorResult<()> {
    let task = job.task_mut(task_id).ok_or_else(|| task_not_found(task_id))?;
    task.record_attempt(attempt)?;
    task.status = status;
    job.updated_at = Utc::now();
    Ok(())
}

pub(crate) fn newest_first(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
