//! Archive listing

use std::io::Read;
use std::path::{Path, PathBuf};
use vpdb_core::models::{ArchiveEntry, ArchiveMetadata};

use crate::error::ExtractError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";

fn is_rar_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "application/rar" | "application/x-rar-compressed"
    )
}

/// List a zip archive, or identify a rar archive by its signature.
pub async fn inspect(mime_type: &str, path: &Path) -> Result<ArchiveMetadata, ExtractError> {
    let mime = mime_type.to_string();
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || inspect_blocking(&mime, &path))
        .await
        .map_err(|e| ExtractError::probe(mime_type, e))?
}

fn inspect_blocking(mime_type: &str, path: &Path) -> Result<ArchiveMetadata, ExtractError> {
    let mut file = std::fs::File::open(path).map_err(|e| ExtractError::io(mime_type, e))?;
    let mut header = [0u8; 8];
    let read = file
        .read(&mut header)
        .map_err(|e| ExtractError::io(mime_type, e))?;
    let header = &header[..read];

    if is_rar_mime(mime_type) || header.starts_with(RAR_MAGIC) {
        if !header.starts_with(RAR_MAGIC) {
            return Err(ExtractError::corrupt(mime_type, "missing rar signature"));
        }
        return Ok(ArchiveMetadata {
            format: "rar".to_string(),
            entries: None,
        });
    }

    if !(header.starts_with(ZIP_MAGIC) || header.starts_with(ZIP_EMPTY_MAGIC)) {
        return Err(ExtractError::corrupt(mime_type, "missing zip signature"));
    }

    let file = std::fs::File::open(path).map_err(|e| ExtractError::io(mime_type, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ExtractError::corrupt(mime_type, e))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| ExtractError::corrupt(mime_type, e))?;
        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            size_bytes: entry.size(),
            is_dir: entry.is_dir(),
        });
    }

    Ok(ArchiveMetadata {
        format: "zip".to_string(),
        entries: Some(entries),
    })
}
