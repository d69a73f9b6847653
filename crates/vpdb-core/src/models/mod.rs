//! Domain models of the file pipeline

pub mod descriptor;
pub mod file;
pub mod metadata;
pub mod mime;

pub use descriptor::{FileDescriptor, UploadPolicy, ValidatedDescriptor};
pub use file::{
    generate_short_id, FileRecord, FileType, Preprocessed, ORIGINAL_VARIATION, SHORT_ID_LENGTH,
};
pub use metadata::{
    ArchiveEntry, ArchiveMetadata, AudioMetadata, ImageMetadata, MediaDetails, Metadata,
    VideoMetadata,
};
pub use mime::{MimeCategory, MimeEntry, MIME_TYPES};
