//! Task model and task execution errors

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Work the pipeline can run in the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// Generate every variation of a stored file.
    ProcessVariations { internal_id: Uuid },
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::ProcessVariations { .. } => write!(f, "process_variations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    /// Zero for the first attempt.
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Task {
    pub fn new(kind: TaskKind, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            retry_count: 0,
            max_retries,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Task execution error that is either recoverable (retried) or not.
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Fail immediately without retrying, e.g. the file no longer exists.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Mark a result's error as unrecoverable
pub trait TaskResultExt<T> {
    fn unrecoverable(self) -> Result<T, TaskError>;
}

impl<T, E: Into<anyhow::Error>> TaskResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_limit() {
        let mut task = Task::new(
            TaskKind::ProcessVariations {
                internal_id: Uuid::new_v4(),
            },
            2,
        );
        assert!(task.can_retry());
        task.retry_count = 2;
        assert!(!task.can_retry());
    }

    #[test]
    fn anyhow_errors_default_to_recoverable() {
        let err: TaskError = anyhow::anyhow!("disk busy").into();
        assert!(err.is_recoverable());

        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("gone"));
        assert!(!result.unrecoverable().unwrap_err().is_recoverable());
    }

    #[test]
    fn kind_serializes_with_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(TaskKind::ProcessVariations { internal_id: id }).unwrap();
        assert_eq!(json["type"], "process_variations");
        assert_eq!(json["internal_id"], id.to_string());
    }
}
