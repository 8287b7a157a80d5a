//! Shared state store (C1): the abstraction circuit breakers persist their
//! state through, so that an "open since" timestamp observed by one gateway
//! instance is visible to every other instance sharing the same store.
//!
//! The only implementation shipped here is in-memory and sharded per key. A
//! replicated backend (Redis, etcd, ...) can be swapped in later by
//! implementing [`StateStore`] against it; nothing above this trait needs
//! to change.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// A versioned, byte-serialized value in the store.
///
/// `version` is opaque to callers beyond equality comparison: it's bumped on
/// every successful write and used for compare-and-swap. A store-level
/// implementation can use a logical counter, a timestamp, or an etag; all
/// that matters is it changes whenever `bytes` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub bytes: Vec<u8>,
    pub version: u64,
}

/// Errors a store can report. Callers (the circuit breaker) treat any error
/// here as "store unavailable" and fail open: traffic keeps flowing on the
/// last locally-known state rather than blocking on the store.
#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("compare-and-swap conflict")]
    CasConflict,
}

/// A key-value store for small pieces of cross-instance shared state.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StateStoreError>;

    /// Unconditional write, always succeeds against a reachable store.
    async fn set(&self, key: &str, bytes: Vec<u8>) -> Result<StoredValue, StateStoreError>;

    /// Writes `bytes` only if the key's current version equals
    /// `expected_version` (or the key is absent and `expected_version` is
    /// `None`). Returns `StateStoreError::CasConflict` otherwise.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        bytes: Vec<u8>,
    ) -> Result<StoredValue, StateStoreError>;
}

const SHARD_COUNT: usize = 16;

/// In-memory state store, sharded by key hash into independent locks so
/// unrelated keys never contend with each other.
pub struct InMemoryStateStore {
    shards: Vec<RwLock<HashMap<String, StoredValue>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard_for(&self, key: &str) -> &RwLock<HashMap<String, StoredValue>> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StateStoreError> {
        let shard = self
            .shard_for(key)
            .read()
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        Ok(shard.get(key).cloned())
    }

    async fn set(&self, key: &str, bytes: Vec<u8>) -> Result<StoredValue, StateStoreError> {
        let mut shard = self
            .shard_for(key)
            .write()
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        let current_version = shard.get(key).map(|v| v.version).unwrap_or(0);
        let value = StoredValue {
            bytes,
            version: current_version + 1,
        };
        shard.insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: Option<u64>,
        bytes: Vec<u8>,
    ) -> Result<StoredValue, StateStoreError> {
        let mut shard = self
            .shard_for(key)
            .write()
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        let current = shard.get(key);
        let current_version = current.map(|v| v.version);
        if current_version != expected_version {
            return Err(StateStoreError::CasConflict);
        }
        let value = StoredValue {
            bytes,
            version: current_version.unwrap_or(0) + 1,
        };
        shard.insert(key.to_string(), value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStateStore::new();
        store.set("k", b"v1".to_vec()).await.unwrap();
        let got = store.get("k").await.unwrap().unwrap();
        assert_eq!(got.bytes, b"v1");
        assert_eq!(got.version, 1);
    }

    #[tokio::test]
    async fn cas_rejects_stale_version() {
        let store = InMemoryStateStore::new();
        let first = store.set("k", b"v1".to_vec()).await.unwrap();
        store.set("k", b"v2".to_vec()).await.unwrap();

        let result = store
            .compare_and_swap("k", Some(first.version), b"v3".to_vec())
            .await;
        assert!(matches!(result, Err(StateStoreError::CasConflict)));
    }

    #[tokio::test]
    async fn cas_on_absent_key_requires_none() {
        let store = InMemoryStateStore::new();
        let result = store.compare_and_swap("fresh", None, b"v1".to_vec()).await;
        assert!(result.is_ok());
    }
}
