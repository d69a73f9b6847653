//! File record persistence
//!
//! [`FileRepository`] is the only writer of file records. Every mutation is a
//! single-row atomic update of the fields it names, so concurrent writers
//! (variation processing, rotation, activation) never overwrite each other.

mod memory;
mod postgres;

pub use memory::InMemoryFileRepository;
pub use postgres::PgFileRepository;

use async_trait::async_trait;
use uuid::Uuid;
use vpdb_core::models::{FileRecord, FileType, Metadata, Preprocessed};
use vpdb_core::AppError;

/// Partial update of a file record, applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdate {
    /// Also sets `bytes` to `metadata.size_bytes`.
    pub metadata: Option<Metadata>,
    pub file_type: Option<FileType>,
    /// `Some(None)` clears the sidecar.
    pub preprocessed: Option<Option<Preprocessed>>,
}

impl FileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn file_type(mut self, file_type: FileType) -> Self {
        self.file_type = Some(file_type);
        self
    }

    pub fn preprocessed(mut self, preprocessed: Option<Preprocessed>) -> Self {
        self.preprocessed = Some(preprocessed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.file_type.is_none() && self.preprocessed.is_none()
    }

    /// Apply to an in-memory copy.
    pub fn apply_to(&self, record: &mut FileRecord) {
        if let Some(metadata) = &self.metadata {
            record.bytes = metadata.size_bytes;
            record.metadata = Some(metadata.clone());
        }
        if let Some(file_type) = self.file_type {
            record.file_type = file_type;
        }
        if let Some(preprocessed) = &self.preprocessed {
            record.preprocessed = preprocessed.clone();
        }
    }
}

/// Result of generating one variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariationOutcome {
    Stored { key: String },
    Failed { error: String },
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, record: &FileRecord) -> Result<FileRecord, AppError>;

    async fn get(&self, internal_id: Uuid) -> Result<Option<FileRecord>, AppError>;

    /// Look up by public short id.
    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError>;

    /// Bulk lookup by public short ids. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<FileRecord>, AppError>;

    /// Bulk lookup by internal ids. Unknown ids are skipped.
    async fn find_by_internal_ids(&self, ids: &[Uuid]) -> Result<Vec<FileRecord>, AppError>;

    /// Apply `update` and return the updated record. `NotFound` if missing.
    async fn update(&self, internal_id: Uuid, update: &FileUpdate) -> Result<FileRecord, AppError>;

    /// Record the outcome of one variation without touching the others.
    async fn record_variation(
        &self,
        internal_id: Uuid,
        variation: &str,
        outcome: &VariationOutcome,
    ) -> Result<(), AppError>;

    /// Compare-and-set activation: succeeds when the file has metadata and is
    /// inactive or already active for `entity_key`. Returns whether this
    /// entity owns it.
    async fn try_activate(&self, internal_id: Uuid, entity_key: &str) -> Result<bool, AppError>;

    /// Undo an activation made for `entity_key`. No-op for other owners.
    async fn release_activation(&self, internal_id: Uuid, entity_key: &str)
        -> Result<bool, AppError>;

    /// Delete the record. Returns whether a row was removed.
    async fn delete(&self, internal_id: Uuid) -> Result<bool, AppError>;
}
