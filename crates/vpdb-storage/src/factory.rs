use crate::{LocalStorage, Storage, StorageError, StorageResult};
use std::sync::Arc;
use vpdb_core::Config;

/// Create the storage backend described by configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let base_path = config.storage_path();
    if base_path.trim().is_empty() {
        return Err(StorageError::ConfigError(
            "STORAGE_PATH not configured".to_string(),
        ));
    }

    let storage = LocalStorage::new(base_path).await?;
    tracing::info!(base_path = %storage.base_path().display(), "Local storage initialized");
    Ok(Arc::new(storage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpdb_core::PipelineConfig;

    #[tokio::test]
    async fn creates_local_storage_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/storage");
        let pipeline = PipelineConfig {
            storage_path: root.to_string_lossy().to_string(),
            ..PipelineConfig::default()
        };

        let storage = create_storage(&Config(Box::new(pipeline))).await.unwrap();
        storage.put("files/other/a.txt", b"x".to_vec()).await.unwrap();
        assert!(root.join("files/other/a.txt").exists());
    }
}
