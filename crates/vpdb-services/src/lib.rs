//! VPDB Services Library
//!
//! The file pipeline proper: upload intake, variation processing, reference
//! tracking for embedding entities and the rotation pre-process protocol.

pub mod context;
pub mod files;
pub mod lifecycle;
pub mod references;
pub mod rotation;
pub mod scheduler;
pub mod variations;

pub use context::{Pipeline, PipelineContext};
pub use files::{CreateOptions, FileStore, PathOptions};
pub use lifecycle::{CreateEntity, CreatedEntity, EntityLifecycle, EntityRepository};
pub use references::{
    EntityContext, FieldPath, ReferenceConfig, ReferenceTracker, RemovalReport, Resolution,
};
pub use rotation::{RotationCoordinator, RotationDirective, RotationRequest};
pub use scheduler::{QueueScheduler, VariationScheduler};
pub use variations::{VariationProcessor, VariationReport};
