//! Rotation pre-process protocol
//!
//! A file moves through Untouched → BackedUp → Mutated and ends either
//! Committed by [`RotationCoordinator::post_process`] or RolledBack by
//! [`RotationCoordinator::rollback_pre_process`].

mod coordinator;
mod directive;

pub use coordinator::RotationCoordinator;
pub use directive::{RotationDirective, RotationRequest};
