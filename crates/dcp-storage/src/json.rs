//! JSON file-based storage.
//!
//! Each key is stored as `<base>/<key>.json`. Writes go through a
//! temporary file followed by a rename so a crash mid-write never leaves
//! a truncated sidecar behind.

use crate::{validate_key, Storage, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// JSON file-based storage.
#[derive(Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
}

impl JsonStorage {
    /// Create a new JSON storage rooted at the given directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{key}.json")))
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "reading sidecar");

        match fs::read_to_string(&path).await {
            Ok(content) => {
                let value: T = serde_json::from_str(&content)?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "writing sidecar");

        fs::create_dir_all(&self.base_path).await?;

        let content = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn storage() -> (tempfile::TempDir, JsonStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_dir, storage) = storage();
        let doc = Doc {
            name: "x".into(),
            count: 3,
        };
        storage.write("ses_a", &doc).await.unwrap();
        let read: Option<Doc> = storage.read("ses_a").await.unwrap();
        assert_eq!(read, Some(doc));
    }

    #[tokio::test]
    async fn test_read_missing_returns_none() {
        let (_dir, storage) = storage();
        let read: Option<Doc> = storage.read("ses_missing").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, storage) = storage();
        storage
            .write("ses_a", &Doc { name: "x".into(), count: 1 })
            .await
            .unwrap();
        storage.remove("ses_a").await.unwrap();
        storage.remove("ses_a").await.unwrap();
        assert!(!storage.exists("ses_a").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_keys() {
        let (_dir, storage) = storage();
        for key in ["ses_b", "ses_a"] {
            storage
                .write(key, &Doc { name: key.into(), count: 0 })
                .await
                .unwrap();
        }
        assert_eq!(storage.list().await.unwrap(), vec!["ses_a", "ses_b"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let storage = JsonStorage::new("/nonexistent/dcp-test-dir");
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serde_error() {
        let (dir, storage) = storage();
        std::fs::write(dir.path().join("ses_bad.json"), "{not json").unwrap();
        let read: StorageResult<Option<Doc>> = storage.read("ses_bad").await;
        assert!(matches!(read, Err(crate::StorageError::Serde(_))));
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let (_dir, storage) = storage();
        let res = storage.write("../escape", &Doc { name: "x".into(), count: 0 }).await;
        assert!(matches!(res, Err(crate::StorageError::InvalidKey(_))));
    }
}
