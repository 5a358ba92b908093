//! Database abstraction layer for AutoCRM
//!
//! This module provides a trait-based abstraction for storage backends,
//! allowing the system to use different stores (JSON files, SQLite, memory)
//! while maintaining a consistent interface.

mod json_backend;
mod memory_backend;
mod migration;
mod sqlite_backend;
mod traits;

pub use json_backend::JsonBackend;
pub use memory_backend::MemoryBackend;
pub use migration::{export_to_json, import_from_json, migrate};
pub use sqlite_backend::SqliteBackend;
pub use traits::{BackendType, CollectionUpdate, DatabaseBackend, DatabaseStats};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Infers the backend type from a path: `.db`/`.sqlite`/`.sqlite3` files are
/// SQLite, anything else is treated as a JSON data directory
pub fn infer_backend_type(path: &Path) -> BackendType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
        _ => BackendType::Json,
    }
}

/// Creates a database backend based on the path or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Arc<dyn DatabaseBackend>> {
    let bt = backend_type.unwrap_or_else(|| infer_backend_type(path));

    tracing::debug!(backend = %bt, path = %path.display(), "opening backend");
    match bt {
        BackendType::Json => Ok(Arc::new(JsonBackend::new(path))),
        BackendType::Sqlite => Ok(Arc::new(SqliteBackend::new(path)?)),
        BackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
