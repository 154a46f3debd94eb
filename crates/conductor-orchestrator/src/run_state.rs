use conductor_core::{ConductorError, ConductorResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

/// Control state of an active run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Executing or about to execute a task.
    Running,
    /// Parked at a task boundary.
    Paused,
    /// Stop requested.
    Cancelled,
}

#[derive(Debug)]
struct RunEntry {
    status: RunStatus,
    current_task_index: usize,
    /// Set while the run loop is parked in [`RunRegistry::wait_while_paused`].
    wake: Option<oneshot::Sender<()>>,
}

impl RunEntry {
    fn wake(&mut self) {
        if let Some(tx) = self.wake.take() {
            let _ = tx.send(());
        }
    }
}

/// Live runs, keyed by job id. Owned by the manager for the life of the
/// process.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<Uuid, RunEntry>>,
}

impl RunRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run for `job_id`. The entry lives until the guard drops.
    pub fn register(self: &Arc<Self>, job_id: Uuid) -> ConductorResult<RunGuard> {
        let mut runs = self.runs.lock();
        if runs.contains_key(&job_id) {
            return Err(ConductorError::AlreadyRunning(job_id));
        }
        runs.insert(
            job_id,
            RunEntry {
                status: RunStatus::Running,
                current_task_index: 0,
                wake: None,
            },
        );
        debug!(job_id = %job_id, "Run registered");
        Ok(RunGuard {
            registry: Arc::clone(self),
            job_id,
        })
    }

    /// `running -> paused`. Takes effect at the next task boundary.
    pub fn pause(&self, job_id: Uuid) -> bool {
        let mut runs = self.runs.lock();
        match runs.get_mut(&job_id) {
            Some(entry) if entry.status == RunStatus::Running => {
                entry.status = RunStatus::Paused;
                info!(job_id = %job_id, "Pause requested");
                true
            }
            _ => false,
        }
    }

    /// `paused -> running`, releasing a parked run loop.
    pub fn resume(&self, job_id: Uuid) -> bool {
        let mut runs = self.runs.lock();
        match runs.get_mut(&job_id) {
            Some(entry) if entry.status == RunStatus::Paused => {
                entry.status = RunStatus::Running;
                entry.wake();
                info!(job_id = %job_id, "Resume requested");
                true
            }
            _ => false,
        }
    }

    /// Mark the run cancelled and release a parked run loop.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let mut runs = self.runs.lock();
        match runs.get_mut(&job_id) {
            Some(entry) => {
                entry.status = RunStatus::Cancelled;
                entry.wake();
                info!(job_id = %job_id, "Cancel requested");
                true
            }
            None => false,
        }
    }

    /// Whether a run is registered for `job_id`.
    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.runs.lock().contains_key(&job_id)
    }

    /// Current run status, if a run is registered.
    pub fn status(&self, job_id: Uuid) -> Option<RunStatus> {
        self.runs.lock().get(&job_id).map(|e| e.status)
    }

    /// Index of the task being run.
    pub fn current_task_index(&self, job_id: Uuid) -> Option<usize> {
        self.runs.lock().get(&job_id).map(|e| e.current_task_index)
    }

    /// Record the task being run.
    pub fn set_current_task(&self, job_id: Uuid, index: usize) {
        if let Some(entry) = self.runs.lock().get_mut(&job_id) {
            entry.current_task_index = index;
        }
    }

    /// Block while the run is paused. Returns the status that ended the
    /// wait: `Running` after a resume, `Cancelled` after a cancel or when the
    /// entry has gone away.
    pub async fn wait_while_paused(&self, job_id: Uuid) -> RunStatus {
        loop {
            let rx = {
                let mut runs = self.runs.lock();
                let Some(entry) = runs.get_mut(&job_id) else {
                    return RunStatus::Cancelled;
                };
                if entry.status != RunStatus::Paused {
                    return entry.status;
                }
                let (tx, rx) = oneshot::channel();
                entry.wake = Some(tx);
                rx
            };
            debug!(job_id = %job_id, "Run parked until resume or cancel");
            // A dropped sender means the entry was replaced or removed; the
            // next iteration re-reads the status either way.
            let _ = rx.await;
        }
    }

    fn remove(&self, job_id: Uuid) {
        if let Some(mut entry) = self.runs.lock().remove(&job_id) {
            entry.wake();
            debug!(job_id = %job_id, "Run state removed");
        }
    }
}

/// Removes the run's entry when dropped, whatever way the loop exits.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    job_id: Uuid,
}

impl RunGuard {
    /// Job this guard holds.
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.remove(self.job_id);
    }
}
