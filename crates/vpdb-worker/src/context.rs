//! Task handler context trait
//!
//! The service layer implements this trait for its pipeline state. The worker
//! calls `dispatch_task` for each task; the implementation matches on the task
//! kind and invokes the appropriate handler.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use crate::task::Task;

/// Context for task dispatch.
///
/// The worker holds a weak reference and upgrades it per task.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Dispatch a task to the appropriate handler and return the result.
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value>;
}

/// Placeholder context used before the real one exists. Dispatch always errors.
struct NoopContext;

#[async_trait]
impl TaskHandlerContext for NoopContext {
    async fn dispatch_task(self: Arc<Self>, _task: &Task) -> Result<serde_json::Value> {
        Err(anyhow!("NoopContext: no handler context available"))
    }
}

/// Weak reference to a no-op context. It is dangling as soon as this returns,
/// so tasks dispatched against it fail as unrecoverable.
pub fn empty_context_weak() -> Weak<dyn TaskHandlerContext> {
    let n: Arc<dyn TaskHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
