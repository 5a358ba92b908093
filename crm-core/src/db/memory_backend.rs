//! In-memory backend, used by tests and `--backend memory` dry runs.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{BackendType, CollectionUpdate, DatabaseBackend};

#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatabaseBackend for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load_collection(&self, key: &str) -> Result<Option<String>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("memory backend lock poisoned"))?;
        Ok(collections.get(key).cloned())
    }

    fn save_collection(&self, key: &str, json: &str) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("memory backend lock poisoned"))?;
        collections.insert(key.to_string(), json.to_string());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("memory backend lock poisoned"))?;
        let mut keys: Vec<String> = collections.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn update_collection(&self, key: &str, update: &mut CollectionUpdate<'_>) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("memory backend lock poisoned"))?;
        if let Some(next) = update(collections.get(key).map(|s| s.as_str()))? {
            collections.insert(key.to_string(), next);
        }
        Ok(())
    }
}
