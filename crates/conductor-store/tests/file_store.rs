#![allow(clippy::unwrap_used, clippy::expect_used)]

use conductor_core::{
    Agent, Attempt, ConductorError, Job, JobStatus, Task, TaskStatus, TaskUpdate,
};
use conductor_store::{FileJobStore, JobStore};
use uuid::Uuid;

fn planned_job() -> Job {
    let researcher = Agent::new("Researcher", "Research").with_tools(["echo"]);
    let writer = Agent::new("Writer", "Write");
    Job::new("alice", "Report", "Write a short report").with_agents(vec![researcher, writer])
}

#[tokio::test]
async fn test_job_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let job = planned_job();
    {
        let store = FileJobStore::new(tmp.path().to_path_buf()).await.unwrap();
        store.create_job(&job).await.unwrap();
        store
            .update_job_status(job.id, JobStatus::Analyzing)
            .await
            .unwrap();
    }

    let store = FileJobStore::new(tmp.path().to_path_buf()).await.unwrap();
    let loaded = store.load_job(job.id).await.unwrap();
    assert_eq!(loaded.status, JobStatus::Analyzing);
    assert_eq!(loaded.agents.len(), 2);
    assert_eq!(loaded.user_id, "alice");
    assert!(loaded.updated_at >= job.updated_at);
}

#[tokio::test]
async fn test_task_lifecycle_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(tmp.path().to_path_buf()).await.unwrap();
    let job = planned_job();
    store.create_job(&job).await.unwrap();

    let second = Task::new(job.id, job.agents[1].id, "Write", "Draft it", 2);
    let first = Task::new(job.id, job.agents[0].id, "Research", "Find facts", 1);
    let first_id = first.id;
    store
        .save_tasks(job.id, vec![second, first])
        .await
        .unwrap();

    // A fresh handle has an empty index and must find the task by scanning.
    let reopened = FileJobStore::new(tmp.path().to_path_buf()).await.unwrap();
    reopened
        .update_task(first_id, TaskUpdate::status(TaskStatus::Running))
        .await
        .unwrap();
    let mut attempt = Attempt::start(1);
    attempt.complete("found", Some("searched".into()));
    reopened
        .append_task_attempt(first_id, attempt, TaskStatus::Completed)
        .await
        .unwrap();

    let loaded = reopened.load_job(job.id).await.unwrap();
    assert_eq!(loaded.tasks[0].title, "Research");
    assert_eq!(loaded.tasks[0].status, TaskStatus::Completed);
    assert_eq!(loaded.tasks[0].attempts[0].response.as_deref(), Some("found"));
    assert_eq!(loaded.tasks[1].status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_list_and_delete() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(tmp.path().to_path_buf()).await.unwrap();
    let a = planned_job();
    let b = planned_job();
    store.create_job(&a).await.unwrap();
    store.create_job(&b).await.unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

    assert_eq!(store.list_jobs().await.unwrap().len(), 2);

    store.delete_job(a.id).await.unwrap();
    let remaining = store.list_jobs().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, b.id);

    assert!(matches!(
        store.delete_job(a.id).await,
        Err(ConductorError::NotFound(_))
    ));
    assert!(matches!(
        store.load_job(Uuid::new_v4()).await,
        Err(ConductorError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_corrupt_file_is_a_store_error() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileJobStore::new(tmp.path().to_path_buf()).await.unwrap();
    let id = Uuid::new_v4();
    std::fs::write(tmp.path().join(format!("{id}.json")), "{not json").unwrap();

    assert!(matches!(
        store.load_job(id).await,
        Err(ConductorError::Store(_))
    ));
    assert!(store.list_jobs().await.unwrap().is_empty());
}
