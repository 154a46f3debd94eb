use crate::store::{
    apply_attempt, apply_update, job_not_found, newest_first, replace_tasks, set_status,
    task_not_found, JobStore,
};
use async_trait::async_trait;
use conductor_core::{
    Attempt, ConductorError, ConductorResult, Job, JobStatus, Task, TaskStatus, TaskUpdate,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// File-based job store: one pretty-printed JSON file per job.
///
/// Writes are serialized through a single lock so read-modify-write cycles
/// from concurrent runs cannot interleave.
pub struct FileJobStore {
    dir: PathBuf,
    /// task id -> job id, filled lazily.
    task_index: Mutex<HashMap<Uuid, Uuid>>,
}

impl FileJobStore {
    /// Open a store in `dir`, creating it if needed.
    pub async fn new(dir: PathBuf) -> ConductorResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            task_index: Mutex::new(HashMap::new()),
        })
    }

    fn job_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> ConductorResult<Job> {
        let path = self.job_path(id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(job_not_found(id)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map_err(|e| ConductorError::Store(format!("Failed to parse job {id}: {e}")))
    }

    async fn write(&self, job: &Job) -> ConductorResult<()> {
        let json = serde_json::to_string_pretty(job)?;
        let tmp = self.dir.join(format!("{}.json.tmp", job.id));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.job_path(job.id)).await?;
        debug!(job_id = %job.id, "Job written");
        Ok(())
    }

    async fn job_ids(&self) -> ConductorResult<Vec<Uuid>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    if let Ok(id) = Uuid::parse_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Load the job owning `task_id`. Must be called with the index locked.
    async fn job_for_task(
        &self,
        index: &mut HashMap<Uuid, Uuid>,
        task_id: Uuid,
    ) -> ConductorResult<Job> {
        if let Some(job_id) = index.get(&task_id).copied() {
            match self.read(job_id).await {
                Ok(job) if job.tasks.iter().any(|t| t.id == task_id) => return Ok(job),
                _ => {
                    index.remove(&task_id);
                }
            }
        }

        for id in self.job_ids().await? {
            let job = match self.read(id).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(job_id = %id, error = %e, "Skipping unreadable job file");
                    continue;
                }
            };
            for task in &job.tasks {
                index.insert(task.id, job.id);
            }
            if job.tasks.iter().any(|t| t.id == task_id) {
                return Ok(job);
            }
        }
        Err(task_not_found(task_id))
    }

    fn index_tasks(index: &mut HashMap<Uuid, Uuid>, job: &Job) {
        for task in &job.tasks {
            index.insert(task.id, job.id);
        }
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create_job(&self, job: &Job) -> ConductorResult<()> {
        let mut index = self.task_index.lock().await;
        self.write(job).await?;
        Self::index_tasks(&mut index, job);
        Ok(())
    }

    async fn load_job(&self, id: Uuid) -> ConductorResult<Job> {
        self.read(id).await
    }

    async fn list_jobs(&self) -> ConductorResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for id in self.job_ids().await? {
            match self.read(id).await {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(job_id = %id, error = %e, "Skipping unreadable job file"),
            }
        }
        newest_first(&mut jobs);
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> ConductorResult<()> {
        let mut index = self.task_index.lock().await;
        match tokio::fs::remove_file(self.job_path(id)).await {
            Ok(()) => {
                index.retain(|_, job_id| *job_id != id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(job_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_job_status(&self, id: Uuid, status: JobStatus) -> ConductorResult<()> {
        let _index = self.task_index.lock().await;
        let mut job = self.read(id).await?;
        set_status(&mut job, status);
        self.write(&job).await
    }

    async fn save_tasks(&self, job_id: Uuid, tasks: Vec<Task>) -> ConductorResult<()> {
        let mut index = self.task_index.lock().await;
        let mut job = self.read(job_id).await?;
        index.retain(|_, owner| *owner != job_id);
        replace_tasks(&mut job, tasks);
        self.write(&job).await?;
        Self::index_tasks(&mut index, &job);
        Ok(())
    }

    async fn update_task(&self, task_id: Uuid, update: TaskUpdate) -> ConductorResult<()> {
        let mut index = self.task_index.lock().await;
        let mut job = self.job_for_task(&mut index, task_id).await?;
        apply_update(&mut job, task_id, &update)?;
        self.write(&job).await
    }

    async fn append_task_attempt(
        &self,
        task_id: Uuid,
        attempt: Attempt,
        status: TaskStatus,
    ) -> ConductorResult<()> {
        let mut index = self.task_index.lock().await;
        let mut job = self.job_for_task(&mut index, task_id).await?;
        apply_attempt(&mut job, task_id, attempt, status)?;
        self.write(&job).await
    }
}
