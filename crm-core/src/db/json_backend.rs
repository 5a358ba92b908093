//! JSON directory storage backend
//!
//! This backend stores each collection in its own JSON file inside a data
//! directory, using the Storage implementation with file locking support.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::traits::{BackendType, CollectionUpdate, DatabaseBackend};
use crate::storage::Storage;

/// JSON directory backend implementation
pub struct JsonBackend {
    storage: Storage,
    path: PathBuf,
}

impl JsonBackend {
    /// Creates a new JSON backend rooted at the given directory
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let path = dir.as_ref().to_path_buf();
        Self {
            storage: Storage::new(&path),
            path,
        }
    }

    /// Gets a reference to the underlying Storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl DatabaseBackend for JsonBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Json
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load_collection(&self, key: &str) -> Result<Option<String>> {
        self.storage.load(key)
    }

    fn save_collection(&self, key: &str, json: &str) -> Result<()> {
        self.storage.save(key, json)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.storage.keys()
    }

    fn update_collection(&self, key: &str, update: &mut CollectionUpdate<'_>) -> Result<()> {
        self.storage.update_atomically(key, |current| update(current))
    }
}
