use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store refused the write, for example because its quota is exhausted.
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Contract for the external key/value string store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored. The previous
    /// value stays in place when this fails.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// In-memory store for tests and `--memory` runs.
///
/// An optional byte quota mimics a browser-style storage limit: a write that
/// would push keys plus values over it is rejected.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            quota: Some(bytes),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(quota) = self.quota {
            let used: usize = guard
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::Rejected(format!(
                    "quota of {quota} bytes exceeded"
                )));
            }
        }
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Aggregates the store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryStore::new()),
        }
    }

    #[must_use]
    pub fn from_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self { kv: store }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix_in_order() {
        let store = InMemoryStore::new();
        for key in ["quiz_b_stats", "other", "quiz_a_history"] {
            store.set(key, "x").await.unwrap();
        }
        assert_eq!(
            store.list_keys("quiz_").await.unwrap(),
            vec!["quiz_a_history".to_string(), "quiz_b_stats".to_string()]
        );
    }

    #[tokio::test]
    async fn quota_rejects_without_touching_previous_value() {
        let store = InMemoryStore::with_quota(16);
        store.set("k", "small").await.unwrap();
        let err = store.set("k", "this value is far too long").await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("small"));
    }
}
