use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Transport failure talking to the key-value service.
#[derive(Debug, Error)]
#[error("key-value store unavailable: {0}")]
pub struct KvError(pub String);

/// Boundary to the sorted key-value service backing the mailbox.
///
/// Single-key puts and deletes, prefix range reads. No multi-key
/// transactions: callers must not assume atomicity across calls.
#[async_trait]
pub trait Kv: Send + Sync {
    /// Write `value` under `key`, overwriting any existing entry.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError>;

    /// All entries whose key starts with `prefix`, in key-lexicographic order.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KvError>;

    /// Remove `key`. Deleting an absent key is a success.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

/// In-process backend with the same sorted-keyspace semantics as etcd.
/// Default backend for dev runs and the one the test suite uses.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), KvError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KvError> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
