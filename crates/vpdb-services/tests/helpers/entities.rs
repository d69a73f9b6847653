use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use vpdb_core::models::FileRecord;
use vpdb_core::{AppError, FieldError};
use vpdb_services::EntityRepository;

/// Reference paths of a release document.
pub const RELEASE_REFERENCES: [&str; 3] = [
    "_backglass",
    "versions[].files[]._file",
    "versions[].files[]._playfield_image",
];

/// In-memory release store. A release needs a non-empty `name`.
#[derive(Default)]
pub struct FakeReleases {
    releases: Mutex<HashMap<String, Value>>,
}

impl FakeReleases {
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.releases.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.releases.lock().await.len()
    }
}

#[async_trait]
impl EntityRepository for FakeReleases {
    async fn validate(
        &self,
        document: &Value,
        _files: &[FileRecord],
    ) -> Result<Vec<FieldError>, AppError> {
        let named = document
            .get("name")
            .and_then(Value::as_str)
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false);
        if named {
            Ok(Vec::new())
        } else {
            Ok(vec![FieldError::new("name", "Name must be provided.")])
        }
    }

    async fn insert(&self, document: &Value, _owner_id: Uuid) -> Result<String, AppError> {
        let key = format!("release-{}", Uuid::new_v4().simple());
        self.releases
            .lock()
            .await
            .insert(key.clone(), document.clone());
        Ok(key)
    }

    async fn delete(&self, entity_key: &str) -> Result<(), AppError> {
        self.releases.lock().await.remove(entity_key);
        Ok(())
    }
}
