#![allow(dead_code)]

pub mod entities;
pub mod fixtures;
pub mod storage;

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use vpdb_core::models::{FileRecord, UploadPolicy};
use vpdb_db::{FileRepository, InMemoryFileRepository};
use vpdb_processing::{
    DefaultExtractor, DefaultGenerator, FfmpegRunner, FfprobeProber, MetadataExtractor,
    VariationGenerator,
};
use vpdb_services::{
    CreateOptions, FileStore, PathOptions, ReferenceConfig, ReferenceTracker,
    RotationCoordinator, VariationProcessor,
};
use vpdb_storage::{LocalStorage, Storage};

use fixtures::{descriptor, gradient_png};
use storage::{FailingStorage, RecordingScheduler};

/// Pipeline over a temporary storage root and an in-memory repository.
pub struct TestEnv {
    pub repository: Arc<InMemoryFileRepository>,
    pub storage: Arc<FailingStorage>,
    pub scheduler: Arc<RecordingScheduler>,
    pub store: Arc<FileStore>,
    pub generator: Arc<dyn VariationGenerator>,
    pub processor: VariationProcessor,
    pub storage_root: PathBuf,
    pub _temp_dir: TempDir,
}

pub fn default_extractor() -> Arc<dyn MetadataExtractor> {
    Arc::new(DefaultExtractor::new(
        FfprobeProber::new("ffprobe").expect("ffprobe path"),
    ))
}

pub async fn setup_test_env() -> TestEnv {
    setup_with_extractor(default_extractor()).await
}

pub async fn setup_with_extractor(extractor: Arc<dyn MetadataExtractor>) -> TestEnv {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let storage_root = temp_dir.path().join("storage");
    let local = LocalStorage::new(storage_root.clone())
        .await
        .expect("local storage");
    let storage = Arc::new(FailingStorage::new(Arc::new(local)));
    let repository = Arc::new(InMemoryFileRepository::new());
    let scheduler = Arc::new(RecordingScheduler::default());

    let store = Arc::new(FileStore::new(
        repository.clone(),
        storage.clone(),
        extractor,
        scheduler.clone(),
        UploadPolicy::default(),
        Duration::from_secs(10),
    ));
    let generator: Arc<dyn VariationGenerator> = Arc::new(DefaultGenerator::new(
        FfmpegRunner::new("ffmpeg").expect("ffmpeg path"),
    ));
    let processor = VariationProcessor::new(store.clone(), generator.clone());

    TestEnv {
        repository,
        storage,
        scheduler,
        store,
        generator,
        processor,
        storage_root,
        _temp_dir: temp_dir,
    }
}

fn contains_files(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let path = entry.path();
        if path.is_dir() {
            contains_files(&path)
        } else {
            true
        }
    })
}

impl TestEnv {
    /// Whether any file was left under the storage root.
    pub async fn storage_root_has_files(&self) -> bool {
        contains_files(&self.storage_root)
    }

    /// Upload a generated PNG of the given size.
    pub async fn upload_png(
        &self,
        file_type: &str,
        width: u32,
        height: u32,
        owner_id: Uuid,
    ) -> FileRecord {
        self.store
            .create(
                &descriptor(file_type, "image/png", owner_id),
                Cursor::new(gradient_png(width, height)),
                CreateOptions::default(),
            )
            .await
            .expect("upload")
    }

    pub async fn reload(&self, record: &FileRecord) -> FileRecord {
        self.repository
            .get(record.internal_id)
            .await
            .expect("repository")
            .expect("record exists")
    }

    pub fn original_key(&self, record: &FileRecord) -> String {
        self.store
            .get_path(record, None, PathOptions::default())
            .expect("original key")
    }

    pub fn backup_key(&self, record: &FileRecord) -> String {
        self.store
            .get_path(record, None, PathOptions::backup())
            .expect("backup key")
    }

    pub async fn original_bytes(&self, record: &FileRecord) -> Vec<u8> {
        self.storage
            .get(&self.original_key(record))
            .await
            .expect("original bytes")
    }

    /// Store sharing this environment's storage and scheduler over another repository.
    pub fn store_with_repository(&self, repository: Arc<dyn FileRepository>) -> FileStore {
        FileStore::new(
            repository,
            self.storage.clone(),
            default_extractor(),
            self.scheduler.clone(),
            UploadPolicy::default(),
            Duration::from_secs(10),
        )
    }

    pub fn tracker(&self) -> ReferenceTracker {
        let config = ReferenceConfig::new(entities::RELEASE_REFERENCES).expect("reference config");
        ReferenceTracker::new(config, self.store.clone())
    }

    pub fn coordinator(&self) -> RotationCoordinator {
        RotationCoordinator::new(self.store.clone())
    }
}
