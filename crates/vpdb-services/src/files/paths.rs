use vpdb_core::models::{mime, FileRecord};
use vpdb_core::AppError;
use vpdb_processing::variation_by_name;
use vpdb_storage::keys::storage_key;
use vpdb_storage::KeyOptions;

pub type PathOptions = KeyOptions;

/// Storage key of a file's original, or of one of its variations.
///
/// Variation extensions follow the generated artifact (a video still is a
/// PNG), so unknown variation names are rejected.
pub fn file_path(
    record: &FileRecord,
    variation: Option<&str>,
    options: PathOptions,
) -> Result<String, AppError> {
    let category = record.mime_category();
    let variation = variation.filter(|v| !v.is_empty());
    let extension = match variation {
        Some(name) => variation_by_name(category, name)
            .map(|spec| spec.output_extension(&record.mime_type))
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Unknown variation \"{}\" for {} files.",
                    name, category
                ))
            })?,
        None => mime::extension_for(&record.mime_type),
    };
    Ok(storage_key(
        record.internal_id,
        category,
        variation,
        extension,
        options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use vpdb_core::models::FileType;

    fn record(file_type: FileType, mime_type: &str) -> FileRecord {
        FileRecord::new_pending(file_type, mime_type, "upload", Uuid::new_v4())
    }

    #[test]
    fn original_and_backup_share_directory() {
        let file = record(FileType::PlayfieldFs, "image/jpeg");
        let original = file_path(&file, None, PathOptions::default()).unwrap();
        let backup = file_path(&file, None, PathOptions::backup()).unwrap();

        assert_eq!(original, format!("files/image/{}.jpg", file.internal_id));
        assert_eq!(backup, format!("files/image/{}_original.jpg", file.internal_id));
    }

    #[test]
    fn variation_extension_follows_artifact() {
        let file = record(FileType::Playfield, "video/mp4");
        let still = file_path(&file, Some("still"), PathOptions::default()).unwrap();
        assert_eq!(still, format!("files/video/still/{}.png", file.internal_id));
    }

    #[test]
    fn empty_variation_is_the_original() {
        let file = record(FileType::Logo, "image/png");
        assert_eq!(
            file_path(&file, Some(""), PathOptions::default()).unwrap(),
            file_path(&file, None, PathOptions::default()).unwrap()
        );
    }

    #[test]
    fn unknown_variation_is_rejected() {
        let file = record(FileType::Rom, "application/zip");
        let err = file_path(&file, Some("medium"), PathOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
