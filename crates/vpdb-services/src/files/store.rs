use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;
use vpdb_core::models::{
    FileDescriptor, FileRecord, Metadata, UploadPolicy, ORIGINAL_VARIATION,
};
use vpdb_core::{AppError, Config, ValidationErrors};
use vpdb_db::{FileRepository, FileUpdate};
use vpdb_processing::{possible_variation_names, MetadataExtractor};
use vpdb_storage::Storage;

use super::paths::{file_path, PathOptions};
use crate::scheduler::VariationScheduler;

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Overrides the configured extraction timeout.
    pub extraction_timeout: Option<Duration>,
}

/// Upload intake and file record lifecycle.
///
/// Owns the mapping from records to storage keys. Every component that reads
/// or writes file bytes goes through [`FileStore::get_path`].
pub struct FileStore {
    repository: Arc<dyn FileRepository>,
    storage: Arc<dyn Storage>,
    extractor: Arc<dyn MetadataExtractor>,
    scheduler: Arc<dyn VariationScheduler>,
    policy: UploadPolicy,
    extraction_timeout: Duration,
}

impl FileStore {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn Storage>,
        extractor: Arc<dyn MetadataExtractor>,
        scheduler: Arc<dyn VariationScheduler>,
        policy: UploadPolicy,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            storage,
            extractor,
            scheduler,
            policy,
            extraction_timeout,
        }
    }

    pub fn from_config(
        config: &Config,
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn Storage>,
        extractor: Arc<dyn MetadataExtractor>,
        scheduler: Arc<dyn VariationScheduler>,
    ) -> Self {
        Self::new(
            repository,
            storage,
            extractor,
            scheduler,
            config.upload_policy(),
            config.metadata_timeout(),
        )
    }

    pub fn repository(&self) -> &Arc<dyn FileRepository> {
        &self.repository
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn get_path(
        &self,
        record: &FileRecord,
        variation: Option<&str>,
        options: PathOptions,
    ) -> Result<String, AppError> {
        file_path(record, variation, options)
    }

    /// Validate, store and analyze an upload.
    ///
    /// Nothing is written when the descriptor is invalid. When storage or
    /// extraction fails, the record and any written bytes are removed again.
    #[tracing::instrument(
        skip(self, descriptor, reader, options),
        fields(
            file.type = %descriptor.file_type,
            file.mime_type = %descriptor.mime_type,
            file.id = tracing::field::Empty,
            internal_id = tracing::field::Empty
        )
    )]
    pub async fn create<R>(
        &self,
        descriptor: &FileDescriptor,
        reader: R,
        options: CreateOptions,
    ) -> Result<FileRecord, AppError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let validated = descriptor.check(&self.policy)?;

        let mut record = FileRecord::new_pending(
            validated.file_type,
            validated.mime_type,
            validated.original_filename,
            validated.owner_id,
        );
        let key = self.get_path(&record, None, PathOptions::default())?;
        record
            .storage_paths
            .insert(ORIGINAL_VARIATION.to_string(), key.clone());

        let span = tracing::Span::current();
        span.record("file.id", record.id.as_str());
        span.record("internal_id", tracing::field::display(record.internal_id));

        let record = self.repository.insert(&record).await?;

        let max = self.policy.max_file_size_bytes;
        let limited = reader.take(max.saturating_add(1));
        let written = match self.storage.put_stream(&key, Box::pin(limited)).await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Failed to store upload");
                self.discard(&record, &key).await;
                return Err(AppError::Storage(e.to_string()));
            }
        };

        if written > max {
            self.discard(&record, &key).await;
            return Err(ValidationErrors::single(
                "content_length",
                format!("File exceeds the maximum size of {} bytes.", max),
            )
            .into());
        }

        let timeout = options.extraction_timeout.unwrap_or(self.extraction_timeout);
        let metadata = match self.extract_with_timeout(&record, timeout).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Metadata extraction failed, removing upload");
                self.discard(&record, &key).await;
                return Err(e);
            }
        };

        let record = match self
            .repository
            .update(record.internal_id, &FileUpdate::new().metadata(metadata))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "Failed to store metadata, removing upload");
                self.discard(&record, &key).await;
                return Err(e);
            }
        };

        tracing::info!(bytes = record.bytes, "Stored {}", record.to_short_string());
        self.schedule_variations(record.internal_id);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<FileRecord, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No such file with ID \"{}\".", id)))
    }

    pub async fn get_by_internal_id(&self, internal_id: Uuid) -> Result<FileRecord, AppError> {
        self.repository
            .get(internal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {}", internal_id)))
    }

    /// Run the extractor against the stored original.
    pub async fn extract_metadata(&self, record: &FileRecord) -> Result<Metadata, AppError> {
        self.extract_with_timeout(record, self.extraction_timeout)
            .await
    }

    async fn extract_with_timeout(
        &self,
        record: &FileRecord,
        timeout: Duration,
    ) -> Result<Metadata, AppError> {
        let key = self.get_path(record, None, PathOptions::default())?;
        let path = self.storage.local_path(&key)?;

        match tokio::time::timeout(timeout, self.extractor.extract(&record.mime_type, &path)).await
        {
            Ok(Ok(metadata)) => Ok(metadata),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(AppError::Metadata {
                mime_type: record.mime_type.clone(),
                message: format!("extraction timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    /// Queue variation processing. Failures are logged, the upload stands.
    pub fn schedule_variations(&self, internal_id: Uuid) {
        if let Err(e) = self.scheduler.schedule(internal_id) {
            tracing::error!(
                internal_id = %internal_id,
                error = %e,
                "Failed to schedule variation processing"
            );
        }
    }

    /// Re-run variation processing for an existing file.
    pub async fn reprocess(&self, id: &str) -> Result<FileRecord, AppError> {
        let record = self.get(id).await?;
        self.scheduler.schedule(record.internal_id)?;
        tracing::info!("Re-scheduled variations of {}", record.to_short_string());
        Ok(record)
    }

    /// Delete every stored artifact of a file, then its record.
    ///
    /// Storage deletions are best effort: failures are logged and the
    /// remaining keys are still attempted.
    #[tracing::instrument(skip(self, record), fields(file.id = %record.id, internal_id = %record.internal_id))]
    pub async fn remove(&self, record: &FileRecord) -> Result<(), AppError> {
        let mut keys = BTreeSet::new();
        keys.insert(self.get_path(record, None, PathOptions::backup())?);
        keys.insert(self.get_path(record, None, PathOptions::default())?);
        keys.extend(record.storage_paths.values().cloned());
        for name in possible_variation_names(record.mime_category()) {
            keys.insert(self.get_path(record, Some(name), PathOptions::default())?);
        }

        let mut failed = 0usize;
        for key in &keys {
            if let Err(e) = self.storage.delete(key).await {
                failed += 1;
                tracing::warn!(key = %key, error = %e, "Failed to delete stored file");
            }
        }

        self.repository.delete(record.internal_id).await?;

        tracing::info!(
            keys = keys.len(),
            failed,
            "Removed {}",
            record.to_short_string()
        );
        Ok(())
    }

    /// Undo a partial upload: bytes first, then the record.
    async fn discard(&self, record: &FileRecord, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete partial upload");
        }
        if let Err(e) = self.repository.delete(record.internal_id).await {
            tracing::error!(error = %e, "Failed to delete pending file record");
        }
    }
}
