//! Background variation processing

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use vpdb_core::models::FileRecord;
use vpdb_core::AppError;
use vpdb_db::VariationOutcome;
use vpdb_processing::{variations_for, VariationGenerator, VariationSpec};

use crate::files::{FileStore, PathOptions};

/// Outcome of one processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariationReport {
    pub internal_id: Uuid,
    /// Variation name to storage key.
    pub generated: BTreeMap<String, String>,
    /// Variation name to error message.
    pub failed: BTreeMap<String, String>,
}

impl VariationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Derives every variation of a file from its current original.
pub struct VariationProcessor {
    store: Arc<FileStore>,
    generator: Arc<dyn VariationGenerator>,
}

impl VariationProcessor {
    pub fn new(store: Arc<FileStore>, generator: Arc<dyn VariationGenerator>) -> Self {
        Self { store, generator }
    }

    /// Load the record and process it. `NotFound` when it no longer exists.
    pub async fn process(&self, internal_id: Uuid) -> Result<VariationReport, AppError> {
        let record = self.store.get_by_internal_id(internal_id).await?;
        self.process_record(&record).await
    }

    /// Generate every variation of `record`, overwriting earlier artifacts.
    ///
    /// A failing variation is recorded on the file and does not stop the others.
    #[tracing::instrument(skip(self, record), fields(file.id = %record.id, internal_id = %record.internal_id))]
    pub async fn process_record(&self, record: &FileRecord) -> Result<VariationReport, AppError> {
        let start = std::time::Instant::now();
        let specs = variations_for(record.file_type, record.mime_category());
        let mut report = VariationReport {
            internal_id: record.internal_id,
            ..VariationReport::default()
        };
        if specs.is_empty() {
            return Ok(report);
        }

        let original = self.store.get_path(record, None, PathOptions::default())?;
        let source = self.store.storage().local_path(&original)?;

        for spec in &specs {
            let outcome = match self.generate_one(record, spec, &source).await {
                Ok(key) => {
                    report.generated.insert(spec.name.to_string(), key.clone());
                    VariationOutcome::Stored { key }
                }
                Err(e) => {
                    tracing::warn!(variation = spec.name, error = %e, "Variation failed");
                    report.failed.insert(spec.name.to_string(), e.to_string());
                    VariationOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            self.store
                .repository()
                .record_variation(record.internal_id, spec.name, &outcome)
                .await?;
        }

        tracing::info!(
            generated = report.generated.len(),
            failed = report.failed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Processed variations of {}",
            record.to_short_string()
        );
        Ok(report)
    }

    async fn generate_one(
        &self,
        record: &FileRecord,
        spec: &VariationSpec,
        source: &std::path::Path,
    ) -> Result<String, AppError> {
        let key = self
            .store
            .get_path(record, Some(spec.name), PathOptions::default())?;
        let data = self
            .generator
            .generate(spec, &record.mime_type, source)
            .await?;
        let written = self.store.storage().put(&key, data).await?;
        tracing::debug!(variation = spec.name, bytes = written, key = %key, "Variation stored");
        Ok(key)
    }
}
