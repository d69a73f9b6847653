//! Background task queue
//!
//! Tasks are held in memory and dispatched to a bounded pool of workers. The
//! queue keeps only a weak reference to its [`TaskHandlerContext`], so the
//! application state that owns the queue can be dropped without a cycle.

pub mod context;
pub mod queue;
pub mod task;

pub use context::{empty_context_weak, TaskHandlerContext};
pub use queue::{TaskFinishedSender, TaskQueue, TaskQueueConfig, MAX_RETRY_BACKOFF_SECS};
pub use task::{Task, TaskError, TaskKind, TaskResultExt, TaskStatus};
