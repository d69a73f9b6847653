//! Shared infrastructure for VPDB binaries
//!
//! Currently telemetry initialization only.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
