//! Extractor output stored on file records

use serde::{Deserialize, Serialize};

/// Structured metadata of a stored binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Lowercase hex SHA-256 of the stored bytes.
    pub checksum: String,
    pub size_bytes: u64,
    pub details: MediaDetails,
}

impl Metadata {
    /// Width and height for media that has geometry.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match &self.details {
            MediaDetails::Image(image) => Some((image.width, image.height)),
            MediaDetails::Video(video) => Some((video.width, video.height)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaDetails {
    Image(ImageMetadata),
    Video(VideoMetadata),
    Audio(AudioMetadata),
    Archive(ArchiveMetadata),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Decoder format name, e.g. `png`.
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub codec: String,
    pub bitrate: Option<u64>,
    pub framerate: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub duration: Option<f64>,
    pub bitrate: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub codec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub format: String,
    /// Listed entries; `None` when the format can only be identified.
    pub entries: Option<Vec<ArchiveEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub size_bytes: u64,
    pub is_dir: bool,
}
