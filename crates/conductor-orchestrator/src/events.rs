use chrono::{DateTime, Utc};
use conductor_core::{ConductorError, ConductorResult, ToolCallRecord};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A progress notification for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Job the event belongs to.
    pub job_id: Uuid,
    /// When it was emitted.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl JobEvent {
    /// Event stamped with the current time.
    pub fn new(job_id: Uuid, kind: EventKind) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// `job_completed`, `job_failed` and `job_cancelled` end a run.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// Kinds of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The run began.
    JobStarted,
    /// The run parked at a task boundary.
    JobPaused,
    /// A paused run continued.
    JobResumed,
    /// The run was cancelled. Terminal.
    JobCancelled,
    /// Every task finished. Terminal.
    JobCompleted,
    /// The job failed. Terminal.
    JobFailed {
        /// Failure message.
        error: String,
    },
    /// A task began its first attempt.
    TaskStarted {
        /// Task id.
        task_id: Uuid,
        /// Task title.
        title: String,
        /// Assigned agent.
        agent_id: Uuid,
        /// 1-based position in the run.
        order: u32,
    },
    /// A task attempt succeeded.
    TaskCompleted {
        /// Task id.
        task_id: Uuid,
        /// Number of the successful attempt.
        attempt: u32,
        /// The agent's answer.
        response: Option<String>,
    },
    /// A task gave up.
    TaskFailed {
        /// Task id.
        task_id: Uuid,
        /// Last failure message.
        error: String,
        /// Number of the last attempt, 0 when the task never ran.
        attempt: u32,
    },
    /// A tool was invoked during a task.
    ToolCalled {
        /// Task the call belongs to.
        task_id: Uuid,
        /// The call and its result.
        record: ToolCallRecord,
    },
    /// Decomposition began.
    AnalysisStarted,
    /// Decomposition produced tasks.
    AnalysisCompleted {
        /// Number of tasks planned.
        task_count: usize,
    },
    /// Decomposition failed.
    AnalysisFailed {
        /// Failure message.
        error: String,
    },
}

impl EventKind {
    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::JobCompleted | EventKind::JobFailed { .. } | EventKind::JobCancelled
        )
    }

    /// Wire name, as used in the serialized `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::JobStarted => "job_started",
            EventKind::JobPaused => "job_paused",
            EventKind::JobResumed => "job_resumed",
            EventKind::JobCancelled => "job_cancelled",
            EventKind::JobCompleted => "job_completed",
            EventKind::JobFailed { .. } => "job_failed",
            EventKind::TaskStarted { .. } => "task_started",
            EventKind::TaskCompleted { .. } => "task_completed",
            EventKind::TaskFailed { .. } => "task_failed",
            EventKind::ToolCalled { .. } => "tool_called",
            EventKind::AnalysisStarted => "analysis_started",
            EventKind::AnalysisCompleted { .. } => "analysis_completed",
            EventKind::AnalysisFailed { .. } => "analysis_failed",
        }
    }
}

/// Subscriber callback. Errors are logged by the bus, never propagated.
pub type EventCallback = Arc<dyn Fn(&JobEvent) -> ConductorResult<()> + Send + Sync>;

type Subscribers = HashMap<Uuid, Vec<(u64, EventCallback)>>;

/// Per-job publish/subscribe registry.
///
/// Cheap to clone; clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `job_id`. Dropping the returned
    /// guard unsubscribes.
    pub fn subscribe<F>(&self, job_id: Uuid, callback: F) -> Subscription
    where
        F: Fn(&JobEvent) -> ConductorResult<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .entry(job_id)
            .or_default()
            .push((id, Arc::new(callback)));
        debug!(job_id = %job_id, subscriber = id, "Subscribed to job events");
        Subscription {
            subscribers: Arc::downgrade(&self.subscribers),
            job_id,
            id,
        }
    }

    /// Forward events of `job_id` into an unbounded channel.
    pub fn subscribe_channel(
        &self,
        job_id: Uuid,
    ) -> (mpsc::UnboundedReceiver<JobEvent>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(job_id, move |event| {
            tx.send(event.clone())
                .map_err(|_| ConductorError::Orchestrator("event receiver dropped".into()))
        });
        (rx, subscription)
    }

    /// Deliver `event` to every subscriber of its job, in subscription order.
    ///
    /// Callbacks run on the caller's thread, outside the registry lock, so a
    /// callback may subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: JobEvent) {
        let callbacks: Vec<(u64, EventCallback)> = match self.subscribers.lock().get(&event.job_id)
        {
            Some(subs) => subs.clone(),
            None => return,
        };

        for (id, callback) in callbacks {
            match std::panic::catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    job_id = %event.job_id,
                    subscriber = id,
                    event = event.kind.name(),
                    error = %e,
                    "Event subscriber failed"
                ),
                Err(_) => warn!(
                    job_id = %event.job_id,
                    subscriber = id,
                    event = event.kind.name(),
                    "Event subscriber panicked"
                ),
            }
        }
    }

    /// Number of live callbacks for `job_id`.
    pub fn subscriber_count(&self, job_id: Uuid) -> usize {
        self.subscribers.lock().get(&job_id).map_or(0, Vec::len)
    }

    /// Whether the registry holds an entry for `job_id`.
    pub fn has_entry(&self, job_id: Uuid) -> bool {
        self.subscribers.lock().contains_key(&job_id)
    }
}

/// Guard returned by [`EventBus::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    subscribers: Weak<Mutex<Subscribers>>,
    job_id: Uuid,
    id: u64,
}

impl Subscription {
    /// Remove the callback now.
    pub fn unsubscribe(self) {}

    /// Job this subscription listens to.
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return;
        };
        let mut subscribers = subscribers.lock();
        if let Some(subs) = subscribers.get_mut(&self.job_id) {
            subs.retain(|(id, _)| *id != self.id);
            if subs.is_empty() {
                subscribers.remove(&self.job_id);
            }
        }
    }
}
