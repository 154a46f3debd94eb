use crate::store::{
    apply_attempt, apply_update, job_not_found, newest_first, replace_tasks, set_status,
    task_not_found, JobStore,
};
use async_trait::async_trait;
use conductor_core::{Attempt, ConductorResult, Job, JobStatus, Task, TaskStatus, TaskUpdate};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store. Used by tests and when embedding the orchestrator.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_task_job<F>(&self, task_id: Uuid, f: F) -> ConductorResult<()>
    where
        F: FnOnce(&mut Job) -> ConductorResult<()> + Send,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .values_mut()
            .find(|j| j.tasks.iter().any(|t| t.id == task_id))
            .ok_or_else(|| task_not_found(task_id))?;
        f(job)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &Job) -> ConductorResult<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn load_job(&self, id: Uuid) -> ConductorResult<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| job_not_found(id))
    }

    async fn list_jobs(&self) -> ConductorResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        newest_first(&mut jobs);
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> ConductorResult<()> {
        self.jobs
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| job_not_found(id))
    }

    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> ConductorResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or_else(|| job_not_found(id))?;
        set_status(job, status);
        Ok(())
    }

    async fn save_tasks(&self, job_id: Uuid, tasks: Vec<Task>) -> ConductorResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or_else(|| job_not_found(job_id))?;
        replace_tasks(job, tasks);
        Ok(())
    }

    async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> ConductorResult<()> {
        self.with_task_job(task_id, |job| apply_update(job, task_id, &update))
            .await
    }

    async fn append_task_attempt(
        &self,
        task_id: Uuid,
        attempt: Attempt,
        status: TaskStatus,
    ) -> ConductorResult<()> {
        self.with_task_job(task_id, |job| apply_attempt(job, task_id, attempt, status))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use conductor_core::{Agent, ConductorError};

    fn job_with_task() -> (Job, Uuid) {
        let agent = Agent::new("Researcher", "Research");
        let mut job = Job::new("u1", "Demo", "Goal").with_agents(vec![agent.clone()]);
        let task = Task::new(job.id, agent.id, "Look", "", 1);
        let task_id = task.id;
        job.tasks.push(task);
        (job, task_id)
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let store = InMemoryJobStore::new();
        let (job, _) = job_with_task();
        store.create_job(&job).await.unwrap();

        let loaded = store.load_job(job.id).await.unwrap();
        assert_eq!(loaded.title, "Demo");
        assert_eq!(loaded.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let store = InMemoryJobStore::new();
        assert!(matches!(
            store.load_job(Uuid::new_v4()).await,
            Err(ConductorError::NotFound(_))
        ));
        assert!(matches!(
            store
                .update_task(Uuid::new_v4(), TaskUpdate::status(TaskStatus::Running))
                .await,
            Err(ConductorError::NotFound(_))
        ));
        assert!(store.delete_job(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_attempts_append_and_set_status() {
        let store = InMemoryJobStore::new();
        let (job, task_id) = job_with_task();
        store.create_job(&job).await.unwrap();

        let mut first = Attempt::start(1);
        first.fail("boom");
        store
            .append_task_attempt(task_id, first, TaskStatus::Pending)
            .await
            .unwrap();
        let mut second = Attempt::start(2);
        second.complete("ok", None);
        store
            .append_task_attempt(task_id, second, TaskStatus::Completed)
            .await
            .unwrap();

        let loaded = store.load_job(job.id).await.unwrap();
        assert_eq!(loaded.tasks[0].attempts.len(), 2);
        assert_eq!(loaded.tasks[0].status, TaskStatus::Completed);

        // Gaps in numbering are rejected.
        let skipped = Attempt::start(4);
        assert!(store
            .append_task_attempt(task_id, skipped, TaskStatus::Failed)
            .await
            .is_err());
    }
}
