use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use vpdb_core::models::FileRecord;
use vpdb_core::{AppError, FieldError, ValidationErrors};
use vpdb_db::FileRepository;

use super::path::{ConcretePath, FieldPath};
use crate::files::FileStore;

pub const OWNER_MISMATCH_MESSAGE: &str = "Referenced file must be of the same owner as referer.";

pub const ACTIVE_REFERENCE_MESSAGE: &str = "Cannot reference active files. If a file is active \
     that means that is has been referenced elsewhere, in which case you cannot reference it again.";

pub const MISSING_REFERENCE_MESSAGE: &str = "Referenced file does not exist.";

fn unknown_file_message(id: &str) -> String {
    format!("No such file with ID \"{}\".", id)
}

fn unprocessed_file_message(id: &str) -> String {
    format!("File \"{}\" has not finished processing.", id)
}

/// Which fields of an entity document hold file references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceConfig {
    fields: Vec<FieldPath>,
}

impl ReferenceConfig {
    pub fn new<I, S>(paths: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = paths
            .into_iter()
            .map(|p| p.as_ref().parse())
            .collect::<Result<Vec<FieldPath>, AppError>>()?;
        Ok(Self { fields })
    }

    /// Add one more reference field.
    pub fn with(mut self, path: FieldPath) -> Self {
        self.fields.push(path);
        self
    }

    pub fn fields(&self) -> &[FieldPath] {
        &self.fields
    }
}

/// Document with short ids replaced by internal ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub document: Value,
    /// Paths whose id did not resolve. Their value is the nil UUID.
    pub invalidations: ValidationErrors,
}

/// The entity on whose behalf references are checked.
#[derive(Debug, Clone, Copy)]
pub struct EntityContext<'a> {
    /// `None` before the entity is persisted.
    pub entity_key: Option<&'a str>,
    pub owner_id: Uuid,
    pub is_new: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    /// Short ids of removed files.
    pub removed: Vec<String>,
    /// Short id to error message.
    pub failed: BTreeMap<String, String>,
}

/// Internal id stored at a reference leaf, either as a resolved string or a
/// populated file object.
fn leaf_internal_id(value: &Value) -> Option<Uuid> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("internal_id")?.as_str()?,
        _ => return None,
    };
    Uuid::parse_str(raw).ok().filter(|id| !id.is_nil())
}

/// Tracks file references of one kind of embedding entity.
pub struct ReferenceTracker {
    config: ReferenceConfig,
    repository: Arc<dyn FileRepository>,
    store: Arc<FileStore>,
}

impl ReferenceTracker {
    pub fn new(config: ReferenceConfig, store: Arc<FileStore>) -> Self {
        Self {
            config,
            repository: store.repository().clone(),
            store,
        }
    }

    pub fn config(&self) -> &ReferenceConfig {
        &self.config
    }

    fn locations(&self, document: &Value) -> Vec<ConcretePath> {
        self.config
            .fields()
            .iter()
            .flat_map(|field| field.expand(document))
            .collect()
    }

    /// Short ids referenced by an unresolved payload, without duplicates.
    pub fn referenced_ids(&self, payload: &Value) -> Vec<String> {
        let locations = self.locations(payload);
        let mut seen = HashSet::new();
        locations
            .iter()
            .filter_map(|loc| loc.get(payload)?.as_str())
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Internal ids referenced by a resolved or populated document.
    pub fn referenced_internal_ids(&self, document: &Value) -> Vec<Uuid> {
        let locations = self.locations(document);
        let mut seen = HashSet::new();
        locations
            .iter()
            .filter_map(|loc| leaf_internal_id(loc.get(document)?))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub async fn referenced_files(&self, document: &Value) -> Result<Vec<FileRecord>, AppError> {
        let ids = self.referenced_internal_ids(document);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repository.find_by_internal_ids(&ids).await
    }

    async fn load(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, FileRecord>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self
            .repository
            .find_by_internal_ids(ids)
            .await?
            .into_iter()
            .map(|f| (f.internal_id, f))
            .collect())
    }

    /// Replace every referenced short id with its internal id.
    ///
    /// Unknown ids become the nil UUID and are reported per path; the other
    /// references still resolve.
    #[tracing::instrument(skip(self, payload))]
    pub async fn resolve_references(&self, mut payload: Value) -> Result<Resolution, AppError> {
        let ids = self.referenced_ids(&payload);
        let known: HashMap<String, Uuid> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.repository
                .find_by_ids(&ids)
                .await?
                .into_iter()
                .map(|f| (f.id, f.internal_id))
                .collect()
        };

        let mut invalidations = ValidationErrors::new();
        for location in self.locations(&payload) {
            let Some(slot) = location.get_mut(&mut payload) else {
                continue;
            };
            let resolved = slot.as_str().and_then(|id| known.get(id)).copied();
            match resolved {
                Some(internal_id) => *slot = Value::String(internal_id.to_string()),
                None => {
                    let shown = match slot.as_str() {
                        Some(id) => id.to_string(),
                        None => slot.to_string(),
                    };
                    invalidations.push(
                        FieldError::new(location.to_string(), unknown_file_message(&shown))
                            .with_value(shown),
                    );
                    *slot = Value::String(Uuid::nil().to_string());
                }
            }
        }

        if !invalidations.is_empty() {
            tracing::debug!(count = invalidations.len(), "Unresolved file references");
        }
        Ok(Resolution {
            document: payload,
            invalidations,
        })
    }

    /// Ownership and reuse checks for every resolved reference.
    pub async fn validate(
        &self,
        document: &Value,
        context: &EntityContext<'_>,
    ) -> Result<Vec<FieldError>, AppError> {
        let files = self.load(&self.referenced_internal_ids(document)).await?;
        let mut errors = Vec::new();

        for location in self.locations(document) {
            let Some(id) = location.get(document).and_then(leaf_internal_id) else {
                continue;
            };
            let path = location.to_string();
            let Some(file) = files.get(&id) else {
                errors.push(FieldError::new(path, MISSING_REFERENCE_MESSAGE));
                continue;
            };
            if file.metadata.is_none() {
                errors.push(FieldError::new(path.clone(), unprocessed_file_message(&file.id)));
            }
            if file.created_by != context.owner_id {
                errors.push(FieldError::new(path.clone(), OWNER_MISMATCH_MESSAGE));
            }
            let owned_here =
                context.entity_key.is_some() && file.activated_for.as_deref() == context.entity_key;
            if context.is_new && file.is_active && !owned_here {
                errors.push(FieldError::new(path, ACTIVE_REFERENCE_MESSAGE));
            }
        }
        Ok(errors)
    }

    /// Activate every referenced file for `entity_key` and return the
    /// document with full file data at each reference.
    ///
    /// Activation is a compare-and-set per file, taken in internal id order
    /// so concurrent callers contend for the same file first. When another
    /// entity wins a file, the files activated by this call are released
    /// again and a validation error names the contested path.
    #[tracing::instrument(skip(self, document), fields(entity = %entity_key))]
    pub async fn activate_referenced_files(
        &self,
        entity_key: &str,
        mut document: Value,
    ) -> Result<Value, AppError> {
        let locations = self.locations(&document);
        let mut targets: BTreeMap<Uuid, String> = BTreeMap::new();
        for location in &locations {
            if let Some(id) = location.get(&document).and_then(leaf_internal_id) {
                targets.entry(id).or_insert_with(|| location.to_string());
            }
        }
        let ids: Vec<Uuid> = targets.keys().copied().collect();
        let before = self.load(&ids).await?;

        let mut activated = Vec::new();
        for (id, path) in &targets {
            let Some(file) = before.get(id) else {
                self.release(&activated, entity_key).await;
                return Err(ValidationErrors::single(path.clone(), MISSING_REFERENCE_MESSAGE).into());
            };
            if file.metadata.is_none() {
                self.release(&activated, entity_key).await;
                return Err(
                    ValidationErrors::single(path.clone(), unprocessed_file_message(&file.id))
                        .into(),
                );
            }
            let already_owned = file.is_active && file.activated_for.as_deref() == Some(entity_key);

            match self.repository.try_activate(*id, entity_key).await {
                Ok(true) => {
                    if !already_owned {
                        activated.push(*id);
                    }
                }
                Ok(false) => {
                    tracing::info!(file.id = %file.id, "Lost activation race");
                    self.release(&activated, entity_key).await;
                    return Err(
                        ValidationErrors::single(path.clone(), ACTIVE_REFERENCE_MESSAGE).into(),
                    );
                }
                Err(e) => {
                    self.release(&activated, entity_key).await;
                    return Err(e);
                }
            }
        }

        let after = self.load(&ids).await?;
        for location in &locations {
            let Some(slot) = location.get_mut(&mut document) else {
                continue;
            };
            if let Some(file) = leaf_internal_id(slot).and_then(|id| after.get(&id)) {
                *slot = serde_json::to_value(file)?;
            }
        }

        tracing::info!(activated = activated.len(), "Activated referenced files");
        Ok(document)
    }

    async fn release(&self, ids: &[Uuid], entity_key: &str) {
        for id in ids {
            if let Err(e) = self.repository.release_activation(*id, entity_key).await {
                tracing::error!(internal_id = %id, error = %e, "Failed to release activation");
            }
        }
    }

    /// Remove every referenced file. One failure does not stop the others.
    #[tracing::instrument(skip(self, document))]
    pub async fn remove_referenced_files(&self, document: &Value) -> Result<RemovalReport, AppError> {
        let files = self.referenced_files(document).await?;
        let results = join_all(files.iter().map(|f| self.store.remove(f))).await;

        let mut report = RemovalReport::default();
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(()) => report.removed.push(file.id.clone()),
                Err(e) => {
                    tracing::warn!(file.id = %file.id, error = %e, "Failed to remove referenced file");
                    report.failed.insert(file.id.clone(), e.to_string());
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_ids_come_from_strings_or_populated_files() {
        let id = Uuid::new_v4();
        assert_eq!(leaf_internal_id(&json!(id.to_string())), Some(id));
        assert_eq!(
            leaf_internal_id(&json!({ "id": "abc", "internal_id": id.to_string() })),
            Some(id)
        );
        assert_eq!(leaf_internal_id(&json!(Uuid::nil().to_string())), None);
        assert_eq!(leaf_internal_id(&json!(42)), None);
    }

    #[test]
    fn config_composes_paths() {
        let config = ReferenceConfig::new(["_backglass"])
            .unwrap()
            .with("versions[].files[]._file".parse().unwrap());
        assert_eq!(config.fields().len(), 2);
        assert!(ReferenceConfig::new(["bad[x]"]).is_err());
    }
}
