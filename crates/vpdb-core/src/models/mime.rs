//! MIME table
//!
//! Every MIME type the pipeline accepts, with its coarse category and the
//! file extension used when deriving storage keys.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Coarse media category; selects the extractor and variation profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    Image,
    Video,
    Audio,
    Archive,
    Other,
}

impl MimeCategory {
    /// Category of a raw MIME string. Unknown types fall back to their
    /// top-level type, then to `Other`.
    pub fn from_mime(mime_type: &str) -> Self {
        if let Some(entry) = lookup(mime_type) {
            return entry.category;
        }
        match mime_type.split('/').next().unwrap_or_default() {
            "image" => MimeCategory::Image,
            "video" => MimeCategory::Video,
            "audio" => MimeCategory::Audio,
            _ => MimeCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeCategory::Image => "image",
            MimeCategory::Video => "video",
            MimeCategory::Audio => "audio",
            MimeCategory::Archive => "archive",
            MimeCategory::Other => "other",
        }
    }
}

impl Display for MimeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for MimeCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MimeCategory::Image),
            "video" => Ok(MimeCategory::Video),
            "audio" => Ok(MimeCategory::Audio),
            "archive" => Ok(MimeCategory::Archive),
            "other" => Ok(MimeCategory::Other),
            _ => Err(anyhow::anyhow!("Invalid mime category: {}", s)),
        }
    }
}

/// One row of the MIME table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeEntry {
    pub mime_type: &'static str,
    pub category: MimeCategory,
    pub extension: &'static str,
}

const fn entry(mime_type: &'static str, category: MimeCategory, extension: &'static str) -> MimeEntry {
    MimeEntry {
        mime_type,
        category,
        extension,
    }
}

pub const MIME_TYPES: &[MimeEntry] = &[
    entry("image/jpeg", MimeCategory::Image, "jpg"),
    entry("image/png", MimeCategory::Image, "png"),
    entry("image/gif", MimeCategory::Image, "gif"),
    entry("image/webp", MimeCategory::Image, "webp"),
    entry("video/mp4", MimeCategory::Video, "mp4"),
    entry("video/x-flv", MimeCategory::Video, "flv"),
    entry("video/avi", MimeCategory::Video, "avi"),
    entry("video/x-msvideo", MimeCategory::Video, "avi"),
    entry("video/x-f4v", MimeCategory::Video, "f4v"),
    entry("audio/mpeg", MimeCategory::Audio, "mp3"),
    entry("audio/mp3", MimeCategory::Audio, "mp3"),
    entry("audio/ogg", MimeCategory::Audio, "ogg"),
    entry("audio/wav", MimeCategory::Audio, "wav"),
    entry("application/zip", MimeCategory::Archive, "zip"),
    entry("application/x-zip-compressed", MimeCategory::Archive, "zip"),
    entry("application/rar", MimeCategory::Archive, "rar"),
    entry("application/x-rar-compressed", MimeCategory::Archive, "rar"),
    entry("application/x-visual-pinball-table", MimeCategory::Other, "vpt"),
    entry("application/x-visual-pinball-table-x", MimeCategory::Other, "vpx"),
    entry("application/vbscript", MimeCategory::Other, "vbs"),
    entry("text/plain", MimeCategory::Other, "txt"),
    entry("application/octet-stream", MimeCategory::Other, "bin"),
];

/// Table row for a MIME type, ignoring case and parameters (`; charset=...`).
pub fn lookup(mime_type: &str) -> Option<&'static MimeEntry> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    MIME_TYPES.iter().find(|e| e.mime_type == essence)
}

/// Extension for a MIME type; `bin` when the type is not in the table.
pub fn extension_for(mime_type: &str) -> &'static str {
    lookup(mime_type).map(|e| e.extension).unwrap_or("bin")
}
