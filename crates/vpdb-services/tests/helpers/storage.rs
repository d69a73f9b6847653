use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncRead;
use uuid::Uuid;
use vpdb_core::models::{FileRecord, Metadata};
use vpdb_core::AppError;
use vpdb_processing::{ExtractError, MetadataExtractor, VariationGenerator, VariationSpec, VariationError};
use vpdb_db::{FileRepository, FileUpdate, VariationOutcome};
use vpdb_services::VariationScheduler;
use vpdb_storage::{Storage, StorageError, StorageResult};

/// Storage wrapper that fails selected operations.
pub struct FailingStorage {
    inner: Arc<dyn Storage>,
    fail_uploads: AtomicBool,
    fail_deletes: Mutex<HashSet<String>>,
}

impl FailingStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            fail_uploads: AtomicBool::new(false),
            fail_deletes: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    /// Fail every delete whose key contains `fragment`.
    pub fn fail_deletes_containing(&self, fragment: impl Into<String>) {
        self.fail_deletes.lock().unwrap().insert(fragment.into());
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<u64> {
        self.inner.put(key, data).await
    }

    async fn put_stream(
        &self,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed(format!("injected failure for {}", key)));
        }
        self.inner.put_stream(key, reader).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let fail = self
            .fail_deletes
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if fail {
            return Err(StorageError::DeleteFailed(format!("injected failure for {}", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        self.inner.content_length(key).await
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        self.inner.copy(from_key, to_key).await
    }

    fn local_path(&self, key: &str) -> StorageResult<PathBuf> {
        self.inner.local_path(key)
    }
}

/// Repository wrapper whose updates can be made to fail.
pub struct FailingRepository {
    inner: Arc<dyn FileRepository>,
    fail_updates: AtomicBool,
}

impl FailingRepository {
    pub fn new(inner: Arc<dyn FileRepository>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileRepository for FailingRepository {
    async fn insert(&self, record: &FileRecord) -> Result<FileRecord, AppError> {
        self.inner.insert(record).await
    }

    async fn get(&self, internal_id: Uuid) -> Result<Option<FileRecord>, AppError> {
        self.inner.get(internal_id).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<FileRecord>, AppError> {
        self.inner.find_by_ids(ids).await
    }

    async fn find_by_internal_ids(&self, ids: &[Uuid]) -> Result<Vec<FileRecord>, AppError> {
        self.inner.find_by_internal_ids(ids).await
    }

    async fn update(&self, internal_id: Uuid, update: &FileUpdate) -> Result<FileRecord, AppError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal(format!("injected update failure for {}", internal_id)));
        }
        self.inner.update(internal_id, update).await
    }

    async fn record_variation(
        &self,
        internal_id: Uuid,
        variation: &str,
        outcome: &VariationOutcome,
    ) -> Result<(), AppError> {
        self.inner.record_variation(internal_id, variation, outcome).await
    }

    async fn try_activate(&self, internal_id: Uuid, entity_key: &str) -> Result<bool, AppError> {
        self.inner.try_activate(internal_id, entity_key).await
    }

    async fn release_activation(
        &self,
        internal_id: Uuid,
        entity_key: &str,
    ) -> Result<bool, AppError> {
        self.inner.release_activation(internal_id, entity_key).await
    }

    async fn delete(&self, internal_id: Uuid) -> Result<bool, AppError> {
        self.inner.delete(internal_id).await
    }
}

/// Scheduler that only records what was scheduled.
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<Uuid>>,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> Vec<Uuid> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn count_for(&self, internal_id: Uuid) -> usize {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == internal_id)
            .count()
    }
}

impl VariationScheduler for RecordingScheduler {
    fn schedule(&self, internal_id: Uuid) -> Result<(), AppError> {
        self.scheduled.lock().unwrap().push(internal_id);
        Ok(())
    }
}

/// Extractor that always fails.
pub struct FailingExtractor;

#[async_trait]
impl MetadataExtractor for FailingExtractor {
    async fn extract(&self, mime_type: &str, _path: &Path) -> Result<Metadata, ExtractError> {
        Err(ExtractError::Unsupported {
            mime_type: mime_type.to_string(),
        })
    }
}

/// Extractor that delegates a fixed number of calls, then fails.
pub struct ExhaustedExtractor {
    inner: Arc<dyn MetadataExtractor>,
    remaining: AtomicUsize,
}

impl ExhaustedExtractor {
    pub fn new(inner: Arc<dyn MetadataExtractor>, successes: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(successes),
        }
    }
}

#[async_trait]
impl MetadataExtractor for ExhaustedExtractor {
    async fn extract(&self, mime_type: &str, path: &Path) -> Result<Metadata, ExtractError> {
        let granted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !granted {
            return Err(ExtractError::Unsupported {
                mime_type: mime_type.to_string(),
            });
        }
        self.inner.extract(mime_type, path).await
    }
}

/// Extractor that never finishes in time.
pub struct SlowExtractor(pub Duration);

#[async_trait]
impl MetadataExtractor for SlowExtractor {
    async fn extract(&self, mime_type: &str, _path: &Path) -> Result<Metadata, ExtractError> {
        tokio::time::sleep(self.0).await;
        Err(ExtractError::Unsupported {
            mime_type: mime_type.to_string(),
        })
    }
}

/// Generator that fails one variation and delegates the rest.
pub struct FlakyGenerator {
    pub inner: Arc<dyn VariationGenerator>,
    pub failing: &'static str,
}

#[async_trait]
impl VariationGenerator for FlakyGenerator {
    async fn generate(
        &self,
        spec: &VariationSpec,
        mime_type: &str,
        source: &Path,
    ) -> Result<Vec<u8>, VariationError> {
        if spec.name == self.failing {
            return Err(VariationError::Task(format!("injected failure for {}", spec.name)));
        }
        self.inner.generate(spec, mime_type, source).await
    }
}
