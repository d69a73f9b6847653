use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::collections::BTreeMap;
use uuid::Uuid;
use vpdb_core::models::{FileRecord, Metadata, Preprocessed};
use vpdb_core::AppError;

use super::{FileRepository, FileUpdate, VariationOutcome};

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    internal_id: Uuid,
    id: String,
    file_type: String,
    mime_type: String,
    original_filename: String,
    bytes: i64,
    storage_paths: Json<BTreeMap<String, String>>,
    variation_errors: Json<BTreeMap<String, String>>,
    metadata: Option<Json<Metadata>>,
    preprocessed: Option<Json<Preprocessed>>,
    is_active: bool,
    activated_for: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = AppError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let file_type = row.file_type.parse().map_err(|_| {
            AppError::Internal(format!(
                "File {} has unknown file type {:?}",
                row.id, row.file_type
            ))
        })?;
        Ok(FileRecord {
            id: row.id,
            internal_id: row.internal_id,
            file_type,
            mime_type: row.mime_type,
            original_filename: row.original_filename,
            bytes: u64::try_from(row.bytes).unwrap_or(0),
            storage_paths: row.storage_paths.0,
            variation_errors: row.variation_errors.0,
            metadata: row.metadata.map(|m| m.0),
            preprocessed: row.preprocessed.map(|p| p.0),
            is_active: row.is_active,
            activated_for: row.activated_for,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

fn rows_to_records(rows: Vec<FileRow>) -> Result<Vec<FileRecord>, AppError> {
    rows.into_iter().map(FileRecord::try_from).collect()
}

/// PostgreSQL-backed file records
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.operation = "insert", file.id = %record.id))]
    async fn insert(&self, record: &FileRecord) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(
            r#"
            INSERT INTO files (
                internal_id, id, file_type, mime_type, original_filename, bytes,
                storage_paths, variation_errors, metadata, preprocessed,
                is_active, activated_for, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(record.internal_id)
        .bind(&record.id)
        .bind(record.file_type.as_str())
        .bind(&record.mime_type)
        .bind(&record.original_filename)
        .bind(i64::try_from(record.bytes).unwrap_or(i64::MAX))
        .bind(Json(&record.storage_paths))
        .bind(Json(&record.variation_errors))
        .bind(record.metadata.as_ref().map(Json))
        .bind(record.preprocessed.as_ref().map(Json))
        .bind(record.is_active)
        .bind(&record.activated_for)
        .bind(record.created_by)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn get(&self, internal_id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>("SELECT * FROM files WHERE internal_id = $1")
            .bind(internal_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "files", db.operation = "select", count = ids.len()))]
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<FileRecord>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<Postgres, FileRow>("SELECT * FROM files WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows_to_records(rows)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "files", db.operation = "select", count = ids.len()))]
    async fn find_by_internal_ids(&self, ids: &[Uuid]) -> Result<Vec<FileRecord>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<Postgres, FileRow>(
            "SELECT * FROM files WHERE internal_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows_to_records(rows)
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "files", db.operation = "update"))]
    async fn update(&self, internal_id: Uuid, update: &FileUpdate) -> Result<FileRecord, AppError> {
        let (set_preprocessed, preprocessed) = match &update.preprocessed {
            Some(value) => (true, value.as_ref()),
            None => (false, None),
        };
        let bytes = update
            .metadata
            .as_ref()
            .map(|m| i64::try_from(m.size_bytes).unwrap_or(i64::MAX));

        let row = sqlx::query_as::<Postgres, FileRow>(
            r#"
            UPDATE files SET
                metadata = COALESCE($2, metadata),
                bytes = COALESCE($3, bytes),
                file_type = COALESCE($4, file_type),
                preprocessed = CASE WHEN $5 THEN $6 ELSE preprocessed END
            WHERE internal_id = $1
            RETURNING *
            "#,
        )
        .bind(internal_id)
        .bind(update.metadata.as_ref().map(Json))
        .bind(bytes)
        .bind(update.file_type.map(|t| t.as_str()))
        .bind(set_preprocessed)
        .bind(preprocessed.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("File {}", internal_id)))
    }

    #[tracing::instrument(skip(self, outcome), fields(db.table = "files", db.operation = "update"))]
    async fn record_variation(
        &self,
        internal_id: Uuid,
        variation: &str,
        outcome: &VariationOutcome,
    ) -> Result<(), AppError> {
        let query = match outcome {
            VariationOutcome::Stored { .. } => {
                r#"
                UPDATE files SET
                    storage_paths = storage_paths || jsonb_build_object($2::text, $3::text),
                    variation_errors = variation_errors - $2::text
                WHERE internal_id = $1
                "#
            }
            VariationOutcome::Failed { .. } => {
                r#"
                UPDATE files SET
                    storage_paths = storage_paths - $2::text,
                    variation_errors = variation_errors || jsonb_build_object($2::text, $3::text)
                WHERE internal_id = $1
                "#
            }
        };
        let value = match outcome {
            VariationOutcome::Stored { key } => key,
            VariationOutcome::Failed { error } => error,
        };

        let result = sqlx::query(query)
            .bind(internal_id)
            .bind(variation)
            .bind(value)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {}", internal_id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update"))]
    async fn try_activate(&self, internal_id: Uuid, entity_key: &str) -> Result<bool, AppError> {
        let activated = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            UPDATE files SET is_active = TRUE, activated_for = $2
            WHERE internal_id = $1 AND metadata IS NOT NULL
              AND (is_active = FALSE OR activated_for = $2)
            RETURNING internal_id
            "#,
        )
        .bind(internal_id)
        .bind(entity_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(activated.is_some())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update"))]
    async fn release_activation(
        &self,
        internal_id: Uuid,
        entity_key: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE files SET is_active = FALSE, activated_for = NULL
            WHERE internal_id = $1 AND activated_for = $2
            "#,
        )
        .bind(internal_id)
        .bind(entity_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete"))]
    async fn delete(&self, internal_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE internal_id = $1")
            .bind(internal_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
