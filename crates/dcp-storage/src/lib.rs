//! Per-session sidecar storage for the dcp engine.
//!
//! The engine persists one small JSON document per session id so that
//! prune state survives a host restart. This crate provides the storage
//! abstraction with two backends:
//! - JSON file storage (one file per session, the default)
//! - In-memory storage (for tests)
//!
//! The engine is memory-authoritative: a failed write is logged and
//! ignored, a missing or corrupt sidecar simply yields no state.

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A key-value store keyed by opaque session ids.
///
/// Values are serialized as JSON. Keys must be plain identifiers; path
/// separators and dot segments are rejected.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value. Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<Option<T>>;

    /// Write a value, creating the backing location if necessary.
    async fn write<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// List all stored keys.
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Validate a storage key.
///
/// Session ids are opaque strings from the host; anything that could
/// escape the sidecar directory is rejected.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key == "."
        || key == ".."
    {
        return Err(StorageError::invalid_key(format!("invalid key: {key:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("ses_abc123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key(".").is_err());
        assert!(validate_key("..").is_err());
    }
}
