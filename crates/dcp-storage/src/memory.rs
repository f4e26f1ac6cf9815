//! In-memory storage for tests.

use crate::{validate_key, Storage, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory storage backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>> {
        validate_key(key)?;
        let data = self.data.read().await;
        match data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> StorageResult<()> {
        validate_key(key)?;
        let value = serde_json::to_value(value)?;
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut keys: Vec<String> = self.data.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.data.read().await.contains_key(key))
    }
}
