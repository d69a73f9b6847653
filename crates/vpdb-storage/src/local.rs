use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`
    /// (e.g. "/var/lib/vpdb/storage"), creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys containing path traversal sequences that could escape the
    /// base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Sibling temp path; renamed over the target once fully written.
    fn temp_path_for(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4()));
        path.with_file_name(name)
    }

    async fn commit_temp(&self, temp: &Path, path: &Path) -> StorageResult<()> {
        if let Err(e) = fs::rename(temp, path).await {
            let _ = fs::remove_file(temp).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let size = data.len() as u64;

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();
        let temp = Self::temp_path_for(&path);

        let write = async {
            let mut file = fs::File::create(&temp).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to create file {}: {}", temp.display(), e))
            })?;
            file.write_all(&data).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to write file {}: {}", temp.display(), e))
            })?;
            file.sync_all().await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to sync file {}: {}", temp.display(), e))
            })
        };
        if let Err(e) = write.await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        self.commit_temp(&temp, &path).await?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(size)
    }

    async fn put_stream(
        &self,
        key: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;
        let temp = Self::temp_path_for(&path);

        let write = async {
            let mut file = fs::File::create(&temp).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to create file {}: {}", temp.display(), e))
            })?;
            let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to write stream to file {}: {}",
                    temp.display(),
                    e
                ))
            })?;
            file.sync_all().await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to sync file {}: {}", temp.display(), e))
            })?;
            Ok::<u64, StorageError>(bytes_copied)
        };
        let bytes_copied = match write.await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                return Err(e);
            }
        };
        self.commit_temp(&temp, &path).await?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream write successful"
        );

        Ok(bytes_copied)
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        fs::read(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::BackendError(e.to_string())
            }
        })?;
        Ok(meta.len())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from_key)?;
        let to_path = self.key_to_path(to_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;
        let temp = Self::temp_path_for(&to_path);

        if let Err(e) = fs::copy(&from_path, &temp).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::BackendError(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            )));
        }
        self.commit_temp(&temp, &to_path).await?;

        tracing::info!(
            from_key = %from_key,
            to_key = %to_key,
            "Local storage copy successful"
        );

        Ok(())
    }

    fn local_path(&self, key: &str) -> StorageResult<PathBuf> {
        self.key_to_path(key)
    }
}
