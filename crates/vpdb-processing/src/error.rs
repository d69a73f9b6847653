use thiserror::Error;
use vpdb_core::AppError;

/// Metadata extraction failures. Every variant names the MIME type it was
/// extracting for.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No metadata extractor for \"{mime_type}\"")]
    Unsupported { mime_type: String },

    #[error("Corrupt {mime_type} data: {reason}")]
    Corrupt { mime_type: String, reason: String },

    #[error("Probing {mime_type} failed: {reason}")]
    Probe { mime_type: String, reason: String },

    #[error("Reading {mime_type} failed: {source}")]
    Io {
        mime_type: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn mime_type(&self) -> &str {
        match self {
            ExtractError::Unsupported { mime_type }
            | ExtractError::Corrupt { mime_type, .. }
            | ExtractError::Probe { mime_type, .. }
            | ExtractError::Io { mime_type, .. } => mime_type,
        }
    }

    pub(crate) fn corrupt(mime_type: &str, reason: impl ToString) -> Self {
        ExtractError::Corrupt {
            mime_type: mime_type.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn probe(mime_type: &str, reason: impl ToString) -> Self {
        ExtractError::Probe {
            mime_type: mime_type.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(mime_type: &str, source: std::io::Error) -> Self {
        ExtractError::Io {
            mime_type: mime_type.to_string(),
            source,
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        AppError::Metadata {
            mime_type: err.mime_type().to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure to derive one variation.
#[derive(Debug, Error)]
pub enum VariationError {
    #[error("Variation \"{variation}\" does not apply to {mime_type}")]
    Unsupported { variation: String, mime_type: String },

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processing task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for VariationError {
    fn from(err: tokio::task::JoinError) -> Self {
        VariationError::Task(err.to_string())
    }
}

impl From<VariationError> for AppError {
    fn from(err: VariationError) -> Self {
        AppError::Internal(err.to_string())
    }
}
