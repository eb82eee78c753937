//! Store Adapter
//!
//! The plugin persists all durable state (balance, transfer log) through
//! this thin async key-value seam. Embedders hand the plugin whatever
//! backend they like; values are stored verbatim with no interpretation.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Store backend failure
///
/// The plugin converts these into `PluginError::Store`; the failing
/// handler aborts and the balance/log stay consistent because each
/// write is the last step of its critical section.
#[derive(Error, Debug, Clone)]
#[error("store backend failure: {0}")]
pub struct StoreError(pub String);

/// Async key-value store contract
///
/// All methods MUST store and return values verbatim. Keys under the
/// `t:` prefix belong to the transfer log; the `balance` key belongs
/// to the balance. No other component writes those keys.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get a value, `None` if the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Put a value, overwriting any previous one.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store backed by a concurrent map.
///
/// The default backend for in-process peers and tests. Not durable
/// across restarts; production embedders supply their own `Store`.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live keys (test introspection).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
