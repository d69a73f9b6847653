use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::metadata::Metadata;
use super::mime::MimeCategory;

/// Length of the public file id.
pub const SHORT_ID_LENGTH: usize = 9;

/// Key of the unprocessed original in [`FileRecord::storage_paths`].
pub const ORIGINAL_VARIATION: &str = "";

/// Generate a public file id (alphanumeric, [`SHORT_ID_LENGTH`] chars).
pub fn generate_short_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Logical file type, chosen by the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    Backglass,
    Logo,
    Playfield,
    PlayfieldFs,
    PlayfieldWs,
    Release,
    Rom,
}

impl FileType {
    pub const ALL: [FileType; 7] = [
        FileType::Backglass,
        FileType::Logo,
        FileType::Playfield,
        FileType::PlayfieldFs,
        FileType::PlayfieldWs,
        FileType::Release,
        FileType::Rom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Backglass => "backglass",
            FileType::Logo => "logo",
            FileType::Playfield => "playfield",
            FileType::PlayfieldFs => "playfield-fs",
            FileType::PlayfieldWs => "playfield-ws",
            FileType::Release => "release",
            FileType::Rom => "rom",
        }
    }

    pub fn is_playfield(&self) -> bool {
        matches!(
            self,
            FileType::Playfield | FileType::PlayfieldFs | FileType::PlayfieldWs
        )
    }

    /// Playfield type matching the given geometry: wide screen when wider
    /// than tall, full screen otherwise.
    pub fn playfield_for(width: u32, height: u32) -> Self {
        if width > height {
            FileType::PlayfieldWs
        } else {
            FileType::PlayfieldFs
        }
    }

    /// MIME categories an upload of this type may carry.
    pub fn accepts(&self, category: MimeCategory) -> bool {
        match self {
            FileType::Backglass | FileType::Logo => category == MimeCategory::Image,
            FileType::Playfield | FileType::PlayfieldFs | FileType::PlayfieldWs => {
                matches!(category, MimeCategory::Image | MimeCategory::Video)
            }
            FileType::Release => true,
            FileType::Rom => category == MimeCategory::Archive,
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Invalid file type: {}", s))
    }
}

/// Transformation state not yet reflected in canonical metadata.
///
/// `rotation` is the committed angle relative to the backup of the original;
/// `unvalidated_rotation` is set between pre-processing and commit/rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preprocessed {
    #[serde(default)]
    pub rotation: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unvalidated_rotation: Option<u16>,
    /// File type before the pending mutation changed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_file_type: Option<FileType>,
}

impl Preprocessed {
    pub fn has_pending(&self) -> bool {
        self.unvalidated_rotation.is_some()
    }

    /// Nothing committed and nothing pending.
    pub fn is_empty(&self) -> bool {
        self.rotation == 0 && self.unvalidated_rotation.is_none()
    }
}

/// Persistent record of one uploaded binary and its derived variations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub internal_id: Uuid,
    pub file_type: FileType,
    pub mime_type: String,
    pub original_filename: String,
    pub bytes: u64,
    /// Variation name to storage key; `""` is the original.
    pub storage_paths: BTreeMap<String, String>,
    /// Last generation failure per variation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variation_errors: BTreeMap<String, String>,
    pub metadata: Option<Metadata>,
    pub preprocessed: Option<Preprocessed>,
    pub is_active: bool,
    /// Key of the entity that activated this file.
    pub activated_for: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// New pending record. Storage paths are filled in by the caller.
    pub fn new_pending(
        file_type: FileType,
        mime_type: impl Into<String>,
        original_filename: impl Into<String>,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: generate_short_id(),
            internal_id: Uuid::new_v4(),
            file_type,
            mime_type: mime_type.into(),
            original_filename: original_filename.into(),
            bytes: 0,
            storage_paths: BTreeMap::new(),
            variation_errors: BTreeMap::new(),
            metadata: None,
            preprocessed: None,
            is_active: false,
            activated_for: None,
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn mime_category(&self) -> MimeCategory {
        MimeCategory::from_mime(&self.mime_type)
    }

    pub fn committed_rotation(&self) -> u16 {
        self.preprocessed.as_ref().map(|p| p.rotation).unwrap_or(0)
    }

    pub fn pending_rotation(&self) -> Option<u16> {
        self.preprocessed
            .as_ref()
            .and_then(|p| p.unvalidated_rotation)
    }

    /// Variations that have been generated at least once.
    pub fn existing_variations(&self) -> impl Iterator<Item = &str> {
        self.storage_paths
            .keys()
            .map(String::as_str)
            .filter(|name| *name != ORIGINAL_VARIATION)
    }

    /// Short description used in log lines.
    pub fn to_short_string(&self) -> String {
        format!("{} \"{}\" ({})", self.file_type, self.original_filename, self.id)
    }
}
