//! Background task dispatch and pipeline wiring

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use vpdb_core::{Config, ErrorMetadata};
use vpdb_db::FileRepository;
use vpdb_processing::{MetadataExtractor, VariationGenerator};
use vpdb_storage::Storage;
use vpdb_worker::{
    Task, TaskError, TaskFinishedSender, TaskHandlerContext, TaskKind, TaskQueue, TaskQueueConfig,
    TaskResultExt,
};

use crate::files::FileStore;
use crate::scheduler::QueueScheduler;
use crate::variations::VariationProcessor;

/// Handler context the worker pool dispatches tasks to.
pub struct PipelineContext {
    processor: Arc<VariationProcessor>,
}

impl PipelineContext {
    pub fn new(processor: Arc<VariationProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl TaskHandlerContext for PipelineContext {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        match &task.kind {
            TaskKind::ProcessVariations { internal_id } => {
                let report = match self.processor.process(*internal_id).await {
                    Ok(report) => report,
                    // Includes a file removed after the task was queued.
                    Err(e) if !e.is_recoverable() => {
                        return Err(e).unrecoverable().map_err(anyhow::Error::from)
                    }
                    Err(e) => return Err(TaskError::recoverable(e).into()),
                };
                Ok(serde_json::to_value(report)?)
            }
        }
    }
}

/// File store, variation processor and task queue wired together.
pub struct Pipeline {
    pub store: Arc<FileStore>,
    pub processor: Arc<VariationProcessor>,
    pub queue: TaskQueue,
    // The queue only holds a weak reference.
    _context: Arc<PipelineContext>,
}

impl Pipeline {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &Config,
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn Storage>,
        extractor: Arc<dyn MetadataExtractor>,
        generator: Arc<dyn VariationGenerator>,
        task_finished_tx: Option<TaskFinishedSender>,
    ) -> Self {
        let scheduler = Arc::new(QueueScheduler::new());
        let store = Arc::new(FileStore::from_config(
            config,
            repository,
            storage,
            extractor,
            scheduler.clone(),
        ));
        let processor = Arc::new(VariationProcessor::new(store.clone(), generator));
        let context = Arc::new(PipelineContext::new(processor.clone()));

        let shared: Arc<dyn TaskHandlerContext> = context.clone();
        let weak: Weak<dyn TaskHandlerContext> = Arc::downgrade(&shared);
        let queue = TaskQueue::new(TaskQueueConfig::from(config), weak, task_finished_tx);
        scheduler.attach(queue.clone());

        Self {
            store,
            processor,
            queue,
            _context: context,
        }
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
