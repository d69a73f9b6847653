//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use async_trait::async_trait;
use std::path::PathBuf;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;
use vpdb_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Stored file {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// Keys are the deterministic paths produced by [`crate::keys::storage_key`]; a
/// backend never invents keys of its own.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at `key`, replacing any existing content. Returns bytes written.
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<u64>;

    /// Write a stream at `key` until EOF. Returns bytes written.
    ///
    /// Readers never observe a partially written file at `key`.
    async fn put_stream(
        &self,
        key: &str,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    /// Read the whole file at `key`
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Delete the file at `key`. Deleting a missing file succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of a file, if it exists.
    async fn content_length(&self, key: &str) -> StorageResult<u64>;

    /// Copy a file from one key to another, replacing the target.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    /// Filesystem path of `key`, for extractors that need one (ffprobe, image decoders).
    fn local_path(&self, key: &str) -> StorageResult<PathBuf>;
}
