//! Create and delete embedding entities that reference files
//!
//! Order of a create: resolve references, pre-process rotations, validate
//! (references and entity rules together), persist, activate, post-process.
//! Any failure after pre-processing rolls the rotations back.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use vpdb_core::models::FileRecord;
use vpdb_core::{AppError, FieldError, ValidationErrors};

use crate::references::{EntityContext, ReferenceTracker, RemovalReport};
use crate::rotation::{RotationCoordinator, RotationDirective};

/// Persistence and rules of the embedding entity.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Entity-specific checks of the resolved document.
    async fn validate(
        &self,
        document: &Value,
        files: &[FileRecord],
    ) -> Result<Vec<FieldError>, AppError>;

    /// Persist the document and return the entity key.
    async fn insert(&self, document: &Value, owner_id: Uuid) -> Result<String, AppError>;

    async fn delete(&self, entity_key: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct CreateEntity {
    /// Payload with short file ids at the configured reference paths.
    pub document: Value,
    pub owner_id: Uuid,
    /// `fileId:angle` list.
    pub rotation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedEntity {
    pub entity_key: String,
    /// Document with full file data at each reference.
    pub document: Value,
}

pub struct EntityLifecycle {
    tracker: Arc<ReferenceTracker>,
    coordinator: Arc<RotationCoordinator>,
    entities: Arc<dyn EntityRepository>,
}

impl EntityLifecycle {
    pub fn new(
        tracker: Arc<ReferenceTracker>,
        coordinator: Arc<RotationCoordinator>,
        entities: Arc<dyn EntityRepository>,
    ) -> Self {
        Self {
            tracker,
            coordinator,
            entities,
        }
    }

    #[tracing::instrument(skip(self, request), fields(owner_id = %request.owner_id, entity = tracing::field::Empty))]
    pub async fn create(&self, request: CreateEntity) -> Result<CreatedEntity, AppError> {
        let directive = RotationDirective::parse(request.rotation.as_deref().unwrap_or(""))?;
        let allowed = self.tracker.referenced_ids(&request.document);
        let resolution = self.tracker.resolve_references(request.document).await?;

        if let Err(e) = self.coordinator.pre_process(&directive, &allowed).await {
            self.coordinator.rollback_pre_process(&directive).await;
            return Err(e);
        }

        let document = resolution.document;
        let mut errors = resolution.invalidations;
        match self.collect_errors(&document, request.owner_id).await {
            Ok(found) => errors.extend(found.errors),
            Err(e) => {
                self.coordinator.rollback_pre_process(&directive).await;
                return Err(e);
            }
        }
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "Entity validation failed");
            self.coordinator.rollback_pre_process(&directive).await;
            return Err(AppError::Validation(errors));
        }

        let entity_key = match self.entities.insert(&document, request.owner_id).await {
            Ok(key) => key,
            Err(e) => {
                self.coordinator.rollback_pre_process(&directive).await;
                return Err(e);
            }
        };
        tracing::Span::current().record("entity", entity_key.as_str());

        let populated = match self
            .tracker
            .activate_referenced_files(&entity_key, document.clone())
            .await
        {
            Ok(populated) => populated,
            Err(e) => {
                if let Err(delete_err) = self.entities.delete(&entity_key).await {
                    tracing::error!(error = %delete_err, "Failed to delete entity after activation failure");
                }
                self.coordinator.rollback_pre_process(&directive).await;
                return Err(e);
            }
        };

        let internal_ids = self.tracker.referenced_internal_ids(&document);
        if let Err(e) = self.coordinator.post_process(&internal_ids).await {
            tracing::error!(error = %e, "Failed to commit pre-processed files");
        }

        tracing::info!("Created entity");
        Ok(CreatedEntity {
            entity_key,
            document: populated,
        })
    }

    async fn collect_errors(
        &self,
        document: &Value,
        owner_id: Uuid,
    ) -> Result<ValidationErrors, AppError> {
        let context = EntityContext {
            entity_key: None,
            owner_id,
            is_new: true,
        };
        let mut errors = ValidationErrors::new();
        errors.extend(self.tracker.validate(document, &context).await?);

        let files = self.tracker.referenced_files(document).await?;
        errors.extend(self.entities.validate(document, &files).await?);
        Ok(errors)
    }

    /// Delete the entity, then every file it references.
    #[tracing::instrument(skip(self, document))]
    pub async fn delete(
        &self,
        entity_key: &str,
        document: &Value,
    ) -> Result<RemovalReport, AppError> {
        self.entities.delete(entity_key).await?;
        let report = self.tracker.remove_referenced_files(document).await?;
        tracing::info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Deleted entity"
        );
        Ok(report)
    }
}
