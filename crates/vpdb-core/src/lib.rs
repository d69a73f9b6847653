//! VPDB Core Library
//!
//! Domain models, error types, configuration and field validation shared by
//! every crate of the file pipeline.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use validation::{FieldError, ValidationErrors};
