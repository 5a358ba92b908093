//! Database abstraction traits
//!
//! This module defines the core trait that all storage backends must implement.
//! A backend is a key-value primitive: one key per entity type, each holding the
//! full JSON array of that type's records.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Types of database backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// One JSON file per collection inside a data directory
    Json,
    /// SQLite database with a single key/value table
    Sqlite,
    /// Process-local map, nothing survives the process
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Json => write!(f, "JSON"),
            BackendType::Sqlite => write!(f, "SQLite"),
            BackendType::Memory => write!(f, "Memory"),
        }
    }
}

impl FromStr for BackendType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(BackendType::Json),
            "sqlite" | "db" => Ok(BackendType::Sqlite),
            "memory" | "mem" => Ok(BackendType::Memory),
            other => anyhow::bail!("Unknown backend '{}' (expected json, sqlite or memory)", other),
        }
    }
}

/// Callback used by [`DatabaseBackend::update_collection`].
///
/// Receives the current snapshot (or `None` if the key is absent) and returns
/// the snapshot to write, or `None` to leave storage untouched.
pub type CollectionUpdate<'a> = dyn FnMut(Option<&str>) -> Result<Option<String>> + 'a;

/// Core trait for database backends
///
/// The design philosophy is:
/// - `load_collection()` and `save_collection()` work with a full snapshot
/// - `update_collection()` is a read-modify-write that backends may make atomic
/// - Every write replaces the whole collection; there is no incremental diff
pub trait DatabaseBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Human readable location (directory, file path, or "memory")
    fn location(&self) -> String;

    /// Loads the raw JSON snapshot stored under `key`
    fn load_collection(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the snapshot stored under `key`
    fn save_collection(&self, key: &str, json: &str) -> Result<()>;

    /// Lists every key currently stored
    fn keys(&self) -> Result<Vec<String>>;

    /// Performs a read-modify-write on one collection.
    /// Default implementation loads, applies changes, and saves without locking
    fn update_collection(&self, key: &str, update: &mut CollectionUpdate<'_>) -> Result<()> {
        let current = self.load_collection(key)?;
        if let Some(next) = update(current.as_deref())? {
            self.save_collection(key, &next)?;
        }
        Ok(())
    }

    /// Returns true if a snapshot exists under `key`
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.load_collection(key)?.is_some())
    }

    /// Writes `seed` under `key` unless the key already exists.
    /// Returns true when the seed was written
    fn seed_if_absent(&self, key: &str, seed: &str) -> Result<bool> {
        let mut seeded = false;
        self.update_collection(key, &mut |current| {
            if current.is_some() {
                Ok(None)
            } else {
                seeded = true;
                Ok(Some(seed.to_string()))
            }
        })?;
        Ok(seeded)
    }

    /// Returns statistics about the database
    fn stats(&self) -> Result<DatabaseStats> {
        let mut collections = Vec::new();
        for key in self.keys()? {
            let records = match self.load_collection(&key)? {
                Some(json) => serde_json::from_str::<Vec<serde_json::Value>>(&json)
                    .map(|v| v.len())
                    .unwrap_or(0),
                None => 0,
            };
            collections.push((key, records));
        }
        collections.sort();
        Ok(DatabaseStats {
            collections,
            backend_type: self.backend_type(),
        })
    }
}

/// Statistics about a database
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// (key, record count) pairs sorted by key
    pub collections: Vec<(String, usize)>,
    pub backend_type: BackendType,
}
