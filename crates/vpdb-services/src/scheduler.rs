//! Background trigger for variation processing

use std::sync::OnceLock;
use uuid::Uuid;
use vpdb_core::AppError;
use vpdb_worker::{TaskKind, TaskQueue};

/// Schedules variation processing for a file without waiting for it.
pub trait VariationScheduler: Send + Sync {
    fn schedule(&self, internal_id: Uuid) -> Result<(), AppError>;
}

impl VariationScheduler for TaskQueue {
    fn schedule(&self, internal_id: Uuid) -> Result<(), AppError> {
        self.submit(TaskKind::ProcessVariations { internal_id })
            .map(|_| ())
            .map_err(|e| AppError::Internal(format!("Failed to schedule variations: {}", e)))
    }
}

/// Scheduler whose queue is attached after construction.
///
/// The queue's handler context needs the file store, and the file store needs
/// a scheduler, so the queue is created last and attached here.
#[derive(Default)]
pub struct QueueScheduler {
    queue: OnceLock<TaskQueue>,
}

impl QueueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the queue. Later calls are ignored.
    pub fn attach(&self, queue: TaskQueue) {
        if self.queue.set(queue).is_err() {
            tracing::warn!("Task queue already attached to scheduler");
        }
    }

    pub fn queue(&self) -> Option<&TaskQueue> {
        self.queue.get()
    }
}

impl VariationScheduler for QueueScheduler {
    fn schedule(&self, internal_id: Uuid) -> Result<(), AppError> {
        match self.queue.get() {
            Some(queue) => queue.schedule(internal_id),
            None => Err(AppError::Internal(
                "No task queue attached to scheduler".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unattached_scheduler_errors() {
        let scheduler = QueueScheduler::new();
        let err = scheduler.schedule(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
