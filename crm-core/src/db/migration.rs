//! Migration utilities for converting between storage backends
//!
//! This module copies collections between backends and provides a single-file
//! JSON bundle format for backup/restore.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

use super::traits::DatabaseBackend;

/// Copies every collection from `source` into `target`
///
/// # Returns
/// The number of collections copied
pub fn migrate(source: &dyn DatabaseBackend, target: &dyn DatabaseBackend) -> Result<usize> {
    let keys = source
        .keys()
        .with_context(|| format!("Failed to list collections in {}", source.location()))?;

    let mut copied = 0;
    for key in keys {
        if let Some(json) = source.load_collection(&key)? {
            target
                .save_collection(&key, &json)
                .with_context(|| format!("Failed to write '{}' to {}", key, target.location()))?;
            copied += 1;
        }
    }

    tracing::info!(
        from = %source.location(),
        to = %target.location(),
        collections = copied,
        "migrated collections"
    );
    Ok(copied)
}

/// Exports every collection of a backend into one JSON file
///
/// The bundle is an object mapping storage key to the collection array:
/// `{"autocrm_contacts": [...], "autocrm_deals": [...]}`
pub fn export_to_json<P: AsRef<Path>>(backend: &dyn DatabaseBackend, json_path: P) -> Result<usize> {
    let mut bundle = Map::new();
    for key in backend.keys()? {
        if let Some(json) = backend.load_collection(&key)? {
            let value: Value = serde_json::from_str(&json)
                .with_context(|| format!("Collection '{}' is not valid JSON", key))?;
            bundle.insert(key, value);
        }
    }

    let count = bundle.len();
    let json = serde_json::to_string_pretty(&Value::Object(bundle))
        .context("Failed to serialize to JSON")?;
    std::fs::write(json_path.as_ref(), json)
        .with_context(|| format!("Failed to write JSON file: {:?}", json_path.as_ref()))?;

    Ok(count)
}

/// Imports a JSON bundle written by [`export_to_json`] into a backend,
/// replacing any collection with the same key
///
/// # Returns
/// The number of collections imported
pub fn import_from_json<P: AsRef<Path>>(json_path: P, backend: &dyn DatabaseBackend) -> Result<usize> {
    let json = std::fs::read_to_string(json_path.as_ref())
        .with_context(|| format!("Failed to read JSON file: {:?}", json_path.as_ref()))?;

    let bundle: Map<String, Value> =
        serde_json::from_str(&json).context("Failed to parse JSON bundle")?;

    for (key, value) in &bundle {
        if !value.is_array() {
            anyhow::bail!("Collection '{}' in bundle is not an array", key);
        }
    }

    for (key, value) in &bundle {
        backend.save_collection(key, &serde_json::to_string(value)?)?;
    }

    Ok(bundle.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{JsonBackend, MemoryBackend, SqliteBackend};
    use tempfile::TempDir;

    #[test]
    fn test_migrate_json_to_sqlite() {
        let temp_dir = TempDir::new().unwrap();
        let json = JsonBackend::new(temp_dir.path().join("data"));
        json.save_collection("autocrm_contacts", "[{\"Id\":1}]").unwrap();
        json.save_collection("autocrm_deals", "[]").unwrap();

        let sqlite = SqliteBackend::new(temp_dir.path().join("crm.db")).unwrap();
        let copied = migrate(&json, &sqlite).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            sqlite.load_collection("autocrm_contacts").unwrap().as_deref(),
            Some("[{\"Id\":1}]")
        );
    }

    #[test]
    fn test_export_import_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let bundle_path = temp_dir.path().join("backup.json");

        let source = MemoryBackend::new();
        source.save_collection("autocrm_tasks", "[{\"Id\":3}]").unwrap();
        assert_eq!(export_to_json(&source, &bundle_path).unwrap(), 1);

        let target = MemoryBackend::new();
        assert_eq!(import_from_json(&bundle_path, &target).unwrap(), 1);

        let restored: Value =
            serde_json::from_str(&target.load_collection("autocrm_tasks").unwrap().unwrap())
                .unwrap();
        assert_eq!(restored[0]["Id"], 3);
    }

    #[test]
    fn test_import_rejects_non_array_collection() {
        let temp_dir = TempDir::new().unwrap();
        let bundle_path = temp_dir.path().join("bad.json");
        std::fs::write(&bundle_path, r#"{"autocrm_tasks": {"Id": 1}}"#).unwrap();

        let target = MemoryBackend::new();
        assert!(import_from_json(&bundle_path, &target).is_err());
        assert!(target.keys().unwrap().is_empty());
    }
}
