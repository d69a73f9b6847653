//! File references held by embedding entities
//!
//! An embedding entity (a release, a game) stores short file ids at
//! configured paths of its document. The tracker resolves them, checks them,
//! activates the files once the entity is persisted and cascades removal.

mod path;
mod tracker;

pub use path::{ConcretePath, ConcreteSegment, FieldPath, PathSegment};
pub use tracker::{
    EntityContext, ReferenceConfig, ReferenceTracker, RemovalReport, Resolution,
    ACTIVE_REFERENCE_MESSAGE, MISSING_REFERENCE_MESSAGE, OWNER_MISMATCH_MESSAGE,
};
