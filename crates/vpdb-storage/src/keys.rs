//! Deterministic storage key layout.
//!
//! Key format: `files/{category}[/{variation}]/{internal_id}[_original].{ext}`.

use uuid::Uuid;
use vpdb_core::models::MimeCategory;

/// Suffix appended to the file stem of the pre-mutation backup.
pub const BACKUP_SUFFIX: &str = "_original";

/// Top-level prefix of every file key.
pub const FILES_PREFIX: &str = "files";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOptions {
    /// Target the backup of the original instead of the working copy.
    pub backup: bool,
}

impl KeyOptions {
    pub fn backup() -> Self {
        Self { backup: true }
    }
}

/// Storage key for a file, an optional variation, and options.
///
/// An empty variation name is the original.
pub fn storage_key(
    internal_id: Uuid,
    category: MimeCategory,
    variation: Option<&str>,
    extension: &str,
    options: KeyOptions,
) -> String {
    let suffix = if options.backup { BACKUP_SUFFIX } else { "" };
    let extension = extension.trim_start_matches('.');
    match variation.filter(|v| !v.is_empty()) {
        Some(variation) => format!(
            "{}/{}/{}/{}{}.{}",
            FILES_PREFIX, category, variation, internal_id, suffix, extension
        ),
        None => format!(
            "{}/{}/{}{}.{}",
            FILES_PREFIX, category, internal_id, suffix, extension
        ),
    }
}
