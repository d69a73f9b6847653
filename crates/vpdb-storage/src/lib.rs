//! VPDB Storage Library
//!
//! Storage abstraction for the file pipeline and its local filesystem backend.
//!
//! # Storage key format
//!
//! Keys are derived from `(internal_id, variation, mime_category)` only:
//!
//! - **Original**: `files/{category}/{internal_id}.{ext}`
//! - **Variation**: `files/{category}/{variation}/{internal_id}.{ext}`
//! - **Backup of the original**: `files/{category}/{internal_id}_original.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so every component resolves the same location.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{KeyOptions, BACKUP_SUFFIX};
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
