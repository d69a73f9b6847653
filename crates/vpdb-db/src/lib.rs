//! Persistence for file records
//!
//! Repositories take the pool by value and never open transactions of their
//! own; every operation is a single statement.

pub mod files;
pub mod pool;

pub use files::{
    FileRepository, FileUpdate, InMemoryFileRepository, PgFileRepository, VariationOutcome,
};
pub use pool::{connect, run_migrations};
