//! Durable partition storage.
//!
//! Every piece of persisted state lives in one string-keyed partition: a
//! single JSON file under the store root holding either a list of records or
//! one value. List reads fail soft (a corrupt partition degrades to empty
//! with a logged diagnostic); single-value reads are strict so callers can
//! decide how to recover.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

/// Root directory under the user config dir used for the partition store.
pub const DEFAULT_STORE_DIR: &str = "relief/store";

/// Partition holding the normalized resource collection.
pub const KEY_RESOURCES: &str = "resources";
/// Legacy resource-request partition, folded into [`KEY_RESOURCES`] on load.
pub const KEY_RESOURCE_REQUESTS: &str = "resourceRequests";
/// Prefix of the per-user response partitions (`responses_<userId>`).
pub const RESPONSES_PREFIX: &str = "responses_";
/// Partition holding the current session profile.
pub const KEY_AUTH_USER: &str = "authUser";
/// Prefix of the per-contact chat logs (`chat_<contactId>`).
pub const CHAT_PREFIX: &str = "chat_";
/// Partition holding the volunteer/NGO directory.
pub const KEY_USERS: &str = "users";

/// Key-value persistence rooted at a directory, one JSON file per key.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a store rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location under the user's config directory.
    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_STORE_DIR)
    }

    /// Directory holding the partition files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }

    /// Whether a partition exists on disk.
    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).is_file()
    }

    /// Read a list partition. Missing or unreadable partitions degrade to an
    /// empty list; the failure is logged, never fatal.
    pub fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let path = self.key_path(key);
        if !path.is_file() {
            return Vec::new();
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("failed to read partition {key}: {err}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(items) => items,
            Err(err) => {
                warn!("failed to parse partition {key}: {err}");
                Vec::new()
            }
        }
    }

    /// Replace a list partition, creating the store directory if needed.
    pub fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        self.write_raw(key, serde_json::to_vec_pretty(items)?)
    }

    /// Read a single-value partition. Returns `Ok(None)` when absent and an
    /// error on unreadable or unparsable content.
    pub fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.key_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read partition {key}"))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse partition {key}"))?;
        Ok(Some(value))
    }

    /// Replace a single-value partition.
    pub fn write_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.write_raw(key, serde_json::to_vec_pretty(value)?)
    }

    /// Remove a partition. Removing an absent partition is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if !path.is_file() {
            return Ok(());
        }
        fs::remove_file(&path).with_context(|| format!("failed to remove partition {key}"))
    }

    /// Enumerate all partition keys present on disk. Unreadable directory
    /// entries are logged and skipped.
    pub fn keys(&self) -> Vec<String> {
        if !self.root.exists() {
            return Vec::new();
        }
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to read store directory {:?}: {err}", self.root);
                return Vec::new();
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("failed to read store entry: {err}");
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        keys
    }

    fn write_raw(&self, key: &str, serialised: Vec<u8>) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.key_path(key);
        fs::write(&path, serialised)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len());
    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
            result.push(ch);
        }
    }
    if result.is_empty() {
        "partition".to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn list_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let storage = Storage::new(dir.path());

        assert!(storage.read_list::<serde_json::Value>("resources").is_empty());

        storage.write_list("resources", &[json!({"id": "1"}), json!({"id": "2"})])?;
        let items: Vec<serde_json::Value> = storage.read_list("resources");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], json!("1"));
        assert!(storage.contains("resources"));
        Ok(())
    }

    #[test]
    fn corrupt_list_degrades_to_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = Storage::new(dir.path());
        std::fs::write(dir.path().join("resources.json"), "{not json")?;

        let items: Vec<serde_json::Value> = storage.read_list("resources");
        assert!(items.is_empty());
        Ok(())
    }

    #[test]
    fn value_reads_are_strict() -> Result<()> {
        let dir = tempdir()?;
        let storage = Storage::new(dir.path());

        assert!(storage.read_value::<serde_json::Value>("authUser")?.is_none());

        storage.write_value("authUser", &json!({"id": "u1"}))?;
        let value = storage.read_value::<serde_json::Value>("authUser")?;
        assert_eq!(value, Some(json!({"id": "u1"})));

        std::fs::write(dir.path().join("authUser.json"), "{not json")?;
        assert!(storage.read_value::<serde_json::Value>("authUser").is_err());

        storage.remove("authUser")?;
        assert!(!storage.contains("authUser"));
        storage.remove("authUser")?;
        Ok(())
    }

    #[test]
    fn keys_enumerates_json_partitions() -> Result<()> {
        let dir = tempdir()?;
        let storage = Storage::new(dir.path());

        assert!(storage.keys().is_empty());

        storage.write_list("responses_u1", &[json!({"id": "1"})])?;
        storage.write_list("responses_u2", &[json!({"id": "2"})])?;
        storage.write_value("authUser", &json!({"id": "u1"}))?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        assert_eq!(storage.keys(), vec!["authUser", "responses_u1", "responses_u2"]);
        Ok(())
    }

    #[test]
    fn sanitize_creates_safe_filenames() {
        assert_eq!(sanitize_key("responses_user 1!"), "responses_user1");
        assert_eq!(sanitize_key("***"), "partition");
    }
}
