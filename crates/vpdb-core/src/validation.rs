//! Field-scoped validation errors
//!
//! Errors are keyed by the dotted path of the offending field
//! (`versions.0.files.1._playfield_image`) and aggregated so a caller can
//! report all of them in one round trip.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(path, message)],
        }
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push(FieldError::new(path, message));
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = FieldError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors reported for one path.
    pub fn for_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.path == path)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.for_path(path).next().is_some()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

impl FromIterator<FieldError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl From<validator::ValidationErrors> for ValidationErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                let field = field.to_string();
                field_errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({}).", e.code));
                    let mut error = FieldError::new(field.clone(), message);
                    if let Some(value) = e.params.get("value") {
                        error.value = Some(value.clone());
                    }
                    error
                })
            })
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Self { errors: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name must be provided."))]
        name: String,
        #[validate(range(max = 10))]
        count: u32,
    }

    #[test]
    fn converts_validator_errors_per_field() {
        let sample = Sample {
            name: String::new(),
            count: 11,
        };
        let errors: ValidationErrors = sample.validate().unwrap_err().into();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.errors[0].path, "count");
        assert!(errors.errors[0].message.contains("range"));
        assert_eq!(errors.errors[1].path, "name");
        assert_eq!(errors.errors[1].message, "Name must be provided.");
    }

    #[test]
    fn aggregates_and_displays() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());
        errors.add("a.0.file", "no such file");
        errors.push(FieldError::new("b", "bad").with_value("x"));
        assert!(errors.has_path("a.0.file"));
        assert!(!errors.has_path("a"));
        assert_eq!(errors.to_string(), "a.0.file: no such file; b: bad");
        assert!(errors.into_result().is_err());
    }
}
