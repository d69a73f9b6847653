use std::sync::Arc;
use uuid::Uuid;
use vpdb_core::models::{FileRecord, FileType, MimeCategory, Preprocessed};
use vpdb_core::AppError;
use vpdb_db::FileUpdate;
use vpdb_processing::{rotate_ccw, RotationAngle, VariationError};

use super::directive::RotationDirective;
use crate::files::{FileStore, PathOptions};

/// Applies rotation directives before the embedding entity is validated,
/// then either commits or rolls them back.
///
/// The working copy is always derived from the backup of the original, so
/// rotations never accumulate re-encoding loss.
pub struct RotationCoordinator {
    store: Arc<FileStore>,
}

fn angle_of(degrees: u16) -> Result<RotationAngle, AppError> {
    RotationAngle::from_degrees(degrees)
        .ok_or_else(|| AppError::Internal(format!("Stored rotation {} is not a quarter turn", degrees)))
}

impl RotationCoordinator {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    /// Validate every entry, then rotate each file's working copy.
    ///
    /// Nothing is touched unless all entries pass validation. Returns the
    /// updated records.
    #[tracing::instrument(skip(self, directive, allowed_ids), fields(files = directive.len()))]
    pub async fn pre_process(
        &self,
        directive: &RotationDirective,
        allowed_ids: &[String],
    ) -> Result<Vec<FileRecord>, AppError> {
        let mut targets = Vec::with_capacity(directive.len());
        for request in directive.requests() {
            let record = self
                .store
                .repository()
                .find_by_id(request.file_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Cannot rotate non-existing file \"{}\".",
                        request.file_id
                    ))
                })?;
            if !allowed_ids.iter().any(|id| id == request.file_id) {
                return Err(AppError::BadRequest(format!(
                    "Cannot rotate file {} because it is not part of the release ({}).",
                    request.file_id,
                    allowed_ids.join(", ")
                )));
            }
            let category = record.mime_category();
            if category != MimeCategory::Image {
                return Err(AppError::BadRequest(format!(
                    "Can only rotate images, this is a \"{}\".",
                    category
                )));
            }
            if !record.file_type.is_playfield() {
                return Err(AppError::BadRequest(format!(
                    "Can only rotate playfield images, got \"{}\".",
                    record.file_type
                )));
            }
            targets.push((record, request.angle));
        }

        let mut updated = Vec::with_capacity(targets.len());
        for (record, angle) in targets {
            updated.push(self.apply(&record, angle).await?);
        }
        Ok(updated)
    }

    #[tracing::instrument(skip(self, record), fields(file.id = %record.id, angle = angle.degrees()))]
    async fn apply(&self, record: &FileRecord, angle: RotationAngle) -> Result<FileRecord, AppError> {
        let storage = self.store.storage();
        let original = self.store.get_path(record, None, PathOptions::default())?;
        let backup = self.store.get_path(record, None, PathOptions::backup())?;
        self.ensure_backup(&original, &backup).await?;

        let total = angle_of(record.committed_rotation())?.then(angle);
        let mut preprocessed = record.preprocessed.clone().unwrap_or_default();
        if preprocessed.committed_file_type.is_none() {
            preprocessed.committed_file_type = Some(record.file_type);
        }
        preprocessed.unvalidated_rotation = Some(total.degrees());
        // Pending state is stored before the working copy changes.
        self.store
            .repository()
            .update(
                record.internal_id,
                &FileUpdate::new().preprocessed(Some(preprocessed)),
            )
            .await?;

        if angle != RotationAngle::None {
            let data = storage.get(&backup).await?;
            let rotated = tokio::task::spawn_blocking(move || rotate_ccw(&data, total))
                .await
                .map_err(VariationError::from)??;
            storage.put(&original, rotated).await?;
        }

        let metadata = self.store.extract_metadata(record).await?;
        let file_type = metadata
            .dimensions()
            .map(|(width, height)| FileType::playfield_for(width, height))
            .unwrap_or(record.file_type);

        let update = FileUpdate::new().metadata(metadata).file_type(file_type);
        let updated = self
            .store
            .repository()
            .update(record.internal_id, &update)
            .await?;

        tracing::info!(
            total = total.degrees(),
            file.type = %updated.file_type,
            "Pre-processed rotation of {}",
            updated.to_short_string()
        );
        Ok(updated)
    }

    /// Snapshot the original once. Later calls keep the first snapshot.
    async fn ensure_backup(&self, original: &str, backup: &str) -> Result<(), AppError> {
        let storage = self.store.storage();
        if !storage.exists(backup).await? {
            storage.copy(original, backup).await?;
            tracing::debug!(backup = %backup, "Backed up original");
        }
        Ok(())
    }

    /// Restore every file of `directive` to its committed rotation.
    ///
    /// Files without a pending rotation are skipped. Failures are logged. When
    /// the restored copy cannot be re-read, its stored metadata is kept.
    #[tracing::instrument(skip(self, directive), fields(files = directive.len()))]
    pub async fn rollback_pre_process(&self, directive: &RotationDirective) {
        for file_id in directive.file_ids() {
            if let Err(e) = self.rollback_one(file_id).await {
                tracing::error!(file.id = %file_id, error = %e, "Failed to roll back rotation");
            }
        }
    }

    async fn rollback_one(&self, file_id: &str) -> Result<(), AppError> {
        let Some(record) = self.store.repository().find_by_id(file_id).await? else {
            return Ok(());
        };
        let Some(mut preprocessed) = record.preprocessed.clone().filter(Preprocessed::has_pending)
        else {
            return Ok(());
        };

        let storage = self.store.storage();
        let original = self.store.get_path(&record, None, PathOptions::default())?;
        let backup = self.store.get_path(&record, None, PathOptions::backup())?;
        let committed = angle_of(preprocessed.rotation)?;
        if committed == RotationAngle::None {
            storage.copy(&backup, &original).await?;
        } else {
            let data = storage.get(&backup).await?;
            let rotated = tokio::task::spawn_blocking(move || rotate_ccw(&data, committed))
                .await
                .map_err(VariationError::from)??;
            storage.put(&original, rotated).await?;
        }

        preprocessed.unvalidated_rotation = None;
        let file_type = preprocessed
            .committed_file_type
            .take()
            .unwrap_or(record.file_type);
        let preprocessed = (!preprocessed.is_empty()).then_some(preprocessed);

        let mut update = FileUpdate::new().file_type(file_type).preprocessed(preprocessed);
        match self.store.extract_metadata(&record).await {
            Ok(metadata) => update = update.metadata(metadata),
            Err(e) => {
                tracing::warn!(file.id = %record.id, error = %e, "Keeping stored metadata of rolled back file");
            }
        }
        self.store
            .repository()
            .update(record.internal_id, &update)
            .await?;

        tracing::info!("Rolled back rotation of {}", record.to_short_string());
        Ok(())
    }

    /// Commit pending rotations and re-schedule variation processing.
    #[tracing::instrument(skip(self, internal_ids), fields(files = internal_ids.len()))]
    pub async fn post_process(&self, internal_ids: &[Uuid]) -> Result<Vec<FileRecord>, AppError> {
        if internal_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .store
            .repository()
            .find_by_internal_ids(internal_ids)
            .await?;

        let mut committed = Vec::new();
        for record in records {
            let Some(mut preprocessed) =
                record.preprocessed.clone().filter(Preprocessed::has_pending)
            else {
                continue;
            };
            if let Some(rotation) = preprocessed.unvalidated_rotation.take() {
                preprocessed.rotation = rotation;
            }
            preprocessed.committed_file_type = None;
            let preprocessed = (!preprocessed.is_empty()).then_some(preprocessed);

            let updated = self
                .store
                .repository()
                .update(record.internal_id, &FileUpdate::new().preprocessed(preprocessed))
                .await?;
            self.store.schedule_variations(updated.internal_id);
            tracing::info!(
                rotation = updated.committed_rotation(),
                "Committed rotation of {}",
                updated.to_short_string()
            );
            committed.push(updated);
        }
        Ok(committed)
    }
}
