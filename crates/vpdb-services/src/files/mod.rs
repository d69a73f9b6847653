//! File intake, lookup and removal

mod paths;
mod store;

pub use paths::{file_path, PathOptions};
pub use store::{CreateOptions, FileStore};
