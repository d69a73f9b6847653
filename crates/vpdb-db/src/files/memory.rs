use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vpdb_core::models::FileRecord;
use vpdb_core::AppError;

use super::{FileRepository, FileUpdate, VariationOutcome};

/// In-process file records with the same atomicity as [`super::PgFileRepository`].
///
/// Used by tests.
#[derive(Default)]
pub struct InMemoryFileRepository {
    records: RwLock<HashMap<Uuid, FileRecord>>,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<FileRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

fn not_found(internal_id: Uuid) -> AppError {
    AppError::NotFound(format!("File {}", internal_id))
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn insert(&self, record: &FileRecord) -> Result<FileRecord, AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.internal_id)
            || records.values().any(|r| r.id == record.id)
        {
            return Err(AppError::Conflict(format!(
                "File {} already exists",
                record.id
            )));
        }
        records.insert(record.internal_id, record.clone());
        Ok(record.clone())
    }

    async fn get(&self, internal_id: Uuid) -> Result<Option<FileRecord>, AppError> {
        Ok(self.records.read().await.get(&internal_id).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<FileRecord>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn find_by_internal_ids(&self, ids: &[Uuid]) -> Result<Vec<FileRecord>, AppError> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn update(&self, internal_id: Uuid, update: &FileUpdate) -> Result<FileRecord, AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&internal_id)
            .ok_or_else(|| not_found(internal_id))?;
        update.apply_to(record);
        Ok(record.clone())
    }

    async fn record_variation(
        &self,
        internal_id: Uuid,
        variation: &str,
        outcome: &VariationOutcome,
    ) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&internal_id)
            .ok_or_else(|| not_found(internal_id))?;
        match outcome {
            VariationOutcome::Stored { key } => {
                record.storage_paths.insert(variation.to_string(), key.clone());
                record.variation_errors.remove(variation);
            }
            VariationOutcome::Failed { error } => {
                record.storage_paths.remove(variation);
                record
                    .variation_errors
                    .insert(variation.to_string(), error.clone());
            }
        }
        Ok(())
    }

    async fn try_activate(&self, internal_id: Uuid, entity_key: &str) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&internal_id) else {
            return Ok(false);
        };
        if record.metadata.is_none() {
            return Ok(false);
        }
        if record.is_active && record.activated_for.as_deref() != Some(entity_key) {
            return Ok(false);
        }
        record.is_active = true;
        record.activated_for = Some(entity_key.to_string());
        Ok(true)
    }

    async fn release_activation(
        &self,
        internal_id: Uuid,
        entity_key: &str,
    ) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        match records.get_mut(&internal_id) {
            Some(record) if record.activated_for.as_deref() == Some(entity_key) => {
                record.is_active = false;
                record.activated_for = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, internal_id: Uuid) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(&internal_id).is_some())
    }
}
