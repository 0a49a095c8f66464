//! Scheduler & Worker Pool: durable queue submission, N cooperative workers,
//! exponential-backoff retry, and a lease-timeout sweeper, built on `tokio`
//! and `tracing`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clinrag_db::queue::Queue;
use clinrag_db::Database;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::SchedulerError;
use crate::handler::TaskHandler;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    pub default_lease_seconds: i64,
    pub max_retry_attempts: u32,
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            default_lease_seconds: 3600,
            max_retry_attempts: 3,
            poll_interval: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Leased,
    Done,
    Failed,
    Canceled,
    Unknown(String),
}

impl TaskState {
    fn from_str(s: &str) -> Self {
        match s {
            "queued" => TaskState::Queued,
            "leased" => TaskState::Leased,
            "done" => TaskState::Done,
            "failed" => TaskState::Failed,
            "canceled" => TaskState::Canceled,
            other => TaskState::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: TaskState,
    pub attempts: i32,
    pub last_error: Option<String>,
}

pub struct Scheduler {
    db: Database,
    config: SchedulerConfig,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl Scheduler {
    pub fn new(db: Database, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self { db, config, handlers: RwLock::new(HashMap::new()) })
    }

    pub async fn register_handler(&self, task_kind: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.write().await.insert(task_kind.into(), handler);
    }

    /// Enqueues a task and returns immediately once it is durably persisted
    /// on the queue, before acknowledging the caller.
    pub async fn submit(&self, task_kind: &str, payload: Value) -> Result<Uuid, SchedulerError> {
        self.submit_with_dedup(task_kind, payload, None).await
    }

    pub async fn submit_with_dedup(
        &self,
        task_kind: &str,
        payload: Value,
        dedup_key: Option<&str>,
    ) -> Result<Uuid, SchedulerError> {
        if !self.handlers.read().await.contains_key(task_kind) {
            return Err(SchedulerError::HandlerNotFound(task_kind.to_string()));
        }
        let id = Queue::new(self.db.pool()).enqueue(task_kind, payload, dedup_key).await?;
        Ok(id)
    }

    /// Cancels a task that has not yet been leased by a worker. A task
    /// already running keeps executing to its own cooperative checkpoint.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), SchedulerError> {
        Queue::new(self.db.pool()).cancel(job_id).await?;
        Ok(())
    }

    pub async fn status(&self, job_id: Uuid) -> Result<StatusSnapshot, SchedulerError> {
        let snapshot = Queue::new(self.db.pool())
            .status(job_id)
            .await?
            .ok_or(SchedulerError::NotFound(job_id))?;
        Ok(StatusSnapshot {
            state: TaskState::from_str(&snapshot.status),
            attempts: snapshot.attempts,
            last_error: snapshot.last_error,
        })
    }

    /// Spawns `worker_count` cooperative workers plus one lease sweeper.
    /// Each worker processes at most one task at a time.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.worker_count + 1);
        for worker_id in 0..self.config.worker_count {
            let scheduler = Arc::clone(self);
            handles.push(tokio::spawn(async move { scheduler.worker_loop(worker_id).await }));
        }
        let scheduler = Arc::clone(self);
        handles.push(tokio::spawn(async move { scheduler.sweeper_loop().await }));
        handles
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        let queue = Queue::new(self.db.pool());
        loop {
            match queue.dequeue(self.config.default_lease_seconds).await {
                Ok(Some(task)) => {
                    tracing::info!(worker_id, task_id = %task.id, task_kind = %task.task_kind, "dequeued task");
                    self.dispatch(&queue, task).await;
                }
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "queue dequeue failed");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    async fn dispatch(&self, queue: &Queue<'_>, task: clinrag_db::queue::Task) {
        let handler = self.handlers.read().await.get(&task.task_kind).cloned();
        let Some(handler) = handler else {
            let _ = queue.mark_permanently_failed(task.id, "no handler registered").await;
            return;
        };

        match handler.handle(task.payload.clone()).await {
            Ok(()) => {
                if let Err(e) = queue.ack(task.id).await {
                    tracing::error!(task_id = %task.id, error = %e, "failed to ack completed task");
                }
            }
            Err(e) if e.kind.is_transient() && task.attempts < self.config.max_retry_attempts as i32 => {
                let backoff = 2i64.pow(task.attempts.max(1) as u32);
                tracing::warn!(task_id = %task.id, attempts = task.attempts, error = %e, "retrying task");
                let _ = queue.nack(task.id, &e.message, backoff).await;
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "task permanently failed");
                let _ = queue.mark_permanently_failed(task.id, &e.message).await;
            }
        }
    }

    async fn sweeper_loop(self: Arc<Self>) {
        let queue = Queue::new(self.db.pool());
        loop {
            tokio::time::sleep(self.config.sweep_interval).await;
            match queue.reclaim_expired().await {
                Ok(ids) if !ids.is_empty() => tracing::warn!(count = ids.len(), "reclaimed abandoned tasks"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "lease sweep failed"),
            }
        }
    }
}
