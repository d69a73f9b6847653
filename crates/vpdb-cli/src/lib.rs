use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;
use vpdb_core::models::MIME_TYPES;
use vpdb_core::{AppError, ErrorMetadata, LogLevel};
use vpdb_worker::TaskStatus;

/// MIME type for a file extension, from the built-in table.
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let extension = if extension == "jpeg" { "jpg".to_string() } else { extension };
    MIME_TYPES
        .iter()
        .find(|entry| entry.extension == extension)
        .map(|entry| entry.mime_type)
}

/// Wait until `count` background tasks have finished or `timeout` elapses.
///
/// Returns the statuses received in time.
pub async fn wait_for_tasks(
    rx: &mut mpsc::Receiver<(Uuid, TaskStatus)>,
    count: usize,
    timeout: Duration,
) -> Vec<TaskStatus> {
    let mut statuses = Vec::with_capacity(count);
    let deadline = tokio::time::Instant::now() + timeout;
    while statuses.len() < count {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some((task_id, status))) => {
                tracing::debug!(%task_id, ?status, "Background task finished");
                statuses.push(status);
            }
            Ok(None) | Err(_) => break,
        }
    }
    statuses
}

/// Error printed to stderr when a command fails.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub code: &'static str,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorReport {
    /// Details are hidden in production and for sensitive errors.
    pub fn new(error: &AppError, is_production: bool) -> Self {
        let show_details = !is_production && !error.is_sensitive();
        Self {
            error: error.client_message(),
            code: error.error_code(),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action(),
            error_type: show_details.then(|| error.error_type()),
            details: show_details.then(|| error.detailed_message()),
        }
    }
}

pub fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Command failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Command failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Command failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_from_extension() {
        assert_eq!(guess_mime(Path::new("bg.JPEG")), Some("image/jpeg"));
        assert_eq!(guess_mime(Path::new("table.vpx")), Some("application/x-visual-pinball-table-x"));
        assert_eq!(guess_mime(Path::new("rom.zip")), Some("application/zip"));
        assert_eq!(guess_mime(Path::new("README")), None);
    }

    #[test]
    fn report_shows_details_of_client_errors() {
        let err = AppError::BadRequest("Wrong angle \"45\", must be one of: [0, 90, 180, 270].".into());
        let report = ErrorReport::new(&err, false);
        assert_eq!(report.code, "BAD_REQUEST");
        assert!(!report.recoverable);
        assert!(report.error.starts_with("Wrong angle"));
        assert_eq!(report.error_type, Some("BadRequest"));
        assert!(report.details.is_some());
    }

    #[test]
    fn report_hides_details_of_sensitive_errors() {
        let err = AppError::Storage("permission denied: /srv/vpdb/files".into());
        let report = ErrorReport::new(&err, false);
        assert_eq!(report.error, "Failed to access storage");
        assert!(report.recoverable);
        assert!(report.details.is_none());
        assert!(report.error_type.is_none());

        let err = AppError::NotFound("No such file with ID \"abc\".".into());
        assert!(ErrorReport::new(&err, true).details.is_none());
    }

    #[tokio::test]
    async fn waiting_stops_at_timeout() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send((Uuid::new_v4(), TaskStatus::Completed)).await.unwrap();

        let statuses = wait_for_tasks(&mut rx, 2, Duration::from_millis(50)).await;
        assert_eq!(statuses, vec![TaskStatus::Completed]);
    }
}
