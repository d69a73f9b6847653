use std::path::{Path, PathBuf};
use vpdb_core::models::ImageMetadata;

use super::transform::format_name;
use crate::error::ExtractError;

/// Decode the image at `path` and report its geometry and format.
///
/// The whole image is decoded so truncated files are rejected here rather
/// than when variations are generated.
pub async fn analyze(mime_type: &str, path: &Path) -> Result<ImageMetadata, ExtractError> {
    let mime = mime_type.to_string();
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || analyze_blocking(&mime, &path))
        .await
        .map_err(|e| ExtractError::probe(mime_type, e))?
}

fn analyze_blocking(mime_type: &str, path: &Path) -> Result<ImageMetadata, ExtractError> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| ExtractError::io(mime_type, e))?
        .with_guessed_format()
        .map_err(|e| ExtractError::io(mime_type, e))?;

    let format = reader
        .format()
        .ok_or_else(|| ExtractError::corrupt(mime_type, "unrecognized image data"))?;
    let image = reader
        .decode()
        .map_err(|e| ExtractError::corrupt(mime_type, e))?;

    Ok(ImageMetadata {
        width: image.width(),
        height: image.height(),
        format: format_name(format).to_string(),
    })
}
