//! Task queue: bounded worker pool, retry and submission.
//!
//! Shutdown: [`TaskQueue::shutdown`] stops the pool from taking new tasks; it
//! does not wait for in-flight tasks. Callers that must drain work subscribe a
//! [`TaskFinishedSender`] and wait for the tasks they submitted.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;
use vpdb_core::Config;

use crate::context::TaskHandlerContext;
use crate::task::{Task, TaskError, TaskKind, TaskStatus};

/// Cap on the exponential retry backoff, in backoff units.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64
        .checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// Notified with the final status of every task.
pub type TaskFinishedSender = mpsc::Sender<(Uuid, TaskStatus)>;

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// `None` runs tasks without a deadline.
    pub task_timeout: Option<Duration>,
    pub max_retries: u32,
    /// Length of one backoff step. One second in production.
    pub backoff_unit: Duration,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_capacity: 256,
            task_timeout: None,
            max_retries: 2,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for TaskQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_workers: config.worker_max_workers(),
            queue_capacity: config.worker_queue_capacity(),
            task_timeout: config.worker_task_timeout(),
            max_retries: config.worker_max_retries(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    config: TaskQueueConfig,
    jobs_tx: mpsc::Sender<Task>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Create a queue and spawn its worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        task_finished_tx: Option<TaskFinishedSender>,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let config_clone = config.clone();
        let retry_tx = jobs_tx.downgrade();
        tokio::spawn(async move {
            Self::worker_pool(
                config_clone,
                context,
                jobs_rx,
                retry_tx,
                shutdown_rx,
                task_finished_tx,
            )
            .await;
        });

        Self {
            config,
            jobs_tx,
            shutdown_tx,
        }
    }

    /// Queue a task without waiting for it to run. Fails when the queue is
    /// full or shut down.
    #[tracing::instrument(skip(self), fields(task.type = %kind))]
    pub fn submit(&self, kind: TaskKind) -> Result<Uuid> {
        let task = Task::new(kind, self.config.max_retries);
        let id = task.id;
        self.jobs_tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => anyhow!("Task queue is full"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("Task queue is shut down"),
        })?;

        tracing::info!(task_id = %id, "Task submitted to queue");
        Ok(id)
    }

    async fn worker_pool(
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        mut jobs_rx: mpsc::Receiver<Task>,
        retry_tx: mpsc::WeakSender<Task>,
        mut shutdown_rx: mpsc::Receiver<()>,
        task_finished_tx: Option<TaskFinishedSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            queue_capacity = config.queue_capacity,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Task queue worker pool shutting down");
                    break;
                }
                job = jobs_rx.recv() => {
                    let Some(task) = job else { break };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let ctx = context.clone();
                    let finished_tx = task_finished_tx.clone();
                    let retry_tx = retry_tx.clone();
                    let config = config.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::process_task(task, config, ctx, retry_tx, finished_tx).await;
                    });
                }
            }
        }

        tracing::info!("Task queue worker pool stopped");
    }

    async fn notify(task_finished_tx: &Option<TaskFinishedSender>, id: Uuid, status: TaskStatus) {
        if let Some(tx) = task_finished_tx {
            let _ = tx.send((id, status)).await;
        }
    }

    #[tracing::instrument(skip_all, fields(task.id = %task.id, task.type = %task.kind, retry_count = task.retry_count))]
    async fn process_task(
        task: Task,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        retry_tx: mpsc::WeakSender<Task>,
        task_finished_tx: Option<TaskFinishedSender>,
    ) {
        let Some(ctx) = context.upgrade() else {
            tracing::error!("TaskHandlerContext was dropped, cannot process task");
            Self::notify(&task_finished_tx, task.id, TaskStatus::Failed).await;
            return;
        };

        let start = std::time::Instant::now();
        let result = match config.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, ctx.dispatch_task(&task)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("Task execution timed out after {:?}", limit)),
            },
            None => ctx.dispatch_task(&task).await,
        };

        let error = match result {
            Ok(value) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    result = %value,
                    "Task completed successfully"
                );
                Self::notify(&task_finished_tx, task.id, TaskStatus::Completed).await;
                return;
            }
            Err(e) => e,
        };

        let is_unrecoverable = error
            .downcast_ref::<TaskError>()
            .map(|te| !te.is_recoverable())
            .unwrap_or(false);

        tracing::error!(
            error = %error,
            max_retries = task.max_retries,
            unrecoverable = is_unrecoverable,
            "Task execution failed"
        );

        if is_unrecoverable || !task.can_retry() {
            Self::notify(&task_finished_tx, task.id, TaskStatus::Failed).await;
            return;
        }

        let backoff = config.backoff_unit * compute_retry_backoff_seconds(task.retry_count) as u32;
        tracing::info!(
            retry_count = task.retry_count + 1,
            backoff_ms = backoff.as_millis() as u64,
            "Scheduling task retry"
        );

        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let mut retried = task;
            retried.retry_count += 1;
            let id = retried.id;
            let requeued = match retry_tx.upgrade() {
                Some(tx) => tx.send(retried).await.is_ok(),
                None => false,
            };
            if !requeued {
                tracing::warn!(task_id = %id, "Task queue closed before retry");
                Self::notify(&task_finished_tx, id, TaskStatus::Failed).await;
            }
        });
    }

    /// Stop taking new tasks. Returns without waiting for in-flight tasks.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}
