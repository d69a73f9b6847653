//! Upload descriptors and the policy they are checked against

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::file::FileType;
use super::mime::{self, MimeCategory};
use crate::validation::{FieldError, ValidationErrors};

/// Client-supplied description of an upload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FileDescriptor {
    #[validate(length(min = 1, message = "File type must be provided."))]
    pub file_type: String,
    #[validate(length(min = 1, max = 255, message = "MIME type must be provided."))]
    pub mime_type: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters."
    ))]
    pub original_filename: String,
    pub owner_id: Uuid,
    /// Declared payload size, when the transport knows it.
    #[serde(default)]
    pub content_length: Option<u64>,
}

/// Limits applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_mime_types: Vec<String>,
    pub max_file_size_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_mime_types: mime::MIME_TYPES
                .iter()
                .map(|e| e.mime_type.to_string())
                .collect(),
            max_file_size_bytes: 500 * 1024 * 1024,
        }
    }
}

impl UploadPolicy {
    pub fn allows(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.allowed_mime_types.iter().any(|m| *m == essence)
    }
}

/// Descriptor that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDescriptor {
    pub file_type: FileType,
    pub mime_type: String,
    pub mime_category: MimeCategory,
    pub original_filename: String,
    pub owner_id: Uuid,
}

impl FileDescriptor {
    /// Validate every field against `policy`, collecting all failures.
    pub fn check(&self, policy: &UploadPolicy) -> Result<ValidatedDescriptor, ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e.into(),
        };

        let file_type = match self.file_type.parse::<FileType>() {
            Ok(t) => Some(t),
            Err(_) => {
                if !self.file_type.is_empty() {
                    errors.push(
                        FieldError::new(
                            "file_type",
                            format!("Invalid file type \"{}\".", self.file_type),
                        )
                        .with_value(self.file_type.clone()),
                    );
                }
                None
            }
        };

        let mime_type = self.mime_type.trim().to_lowercase();
        let category = MimeCategory::from_mime(&mime_type);
        if !mime_type.is_empty() && !policy.allows(&mime_type) {
            errors.push(
                FieldError::new(
                    "mime_type",
                    format!("Invalid MIME type \"{}\".", self.mime_type),
                )
                .with_value(self.mime_type.clone()),
            );
        } else if let Some(file_type) = file_type {
            if !mime_type.is_empty() && !file_type.accepts(category) {
                errors.push(
                    FieldError::new(
                        "mime_type",
                        format!(
                            "Invalid MIME type \"{}\" for file type \"{}\".",
                            self.mime_type, file_type
                        ),
                    )
                    .with_value(self.mime_type.clone()),
                );
            }
        }

        if let Some(length) = self.content_length {
            if length > policy.max_file_size_bytes {
                errors.push(
                    FieldError::new(
                        "content_length",
                        format!(
                            "File size of {} bytes exceeds the maximum of {} bytes.",
                            length, policy.max_file_size_bytes
                        ),
                    )
                    .with_value(length),
                );
            }
        }

        errors.into_result()?;

        let file_type = file_type.ok_or_else(|| {
            ValidationErrors::single("file_type", "File type must be provided.")
        })?;

        Ok(ValidatedDescriptor {
            file_type,
            mime_type,
            mime_category: category,
            original_filename: self.original_filename.clone(),
            owner_id: self.owner_id,
        })
    }
}
