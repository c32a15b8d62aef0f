//! In-memory storage implementation.

use super::{BoxFuture, ObjectStore, RecordKey, ScalarStore, ScalarValue, StorageError, StorageResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// In-memory history store for testing and ephemeral use.
///
/// An optional byte quota makes `put` fail with
/// [`StorageError::QuotaExceeded`] once the stored values would exceed it.
#[derive(Default)]
pub struct MemoryObjectStore {
    records: RwLock<BTreeMap<RecordKey, Vec<u8>>>,
    quota: Option<usize>,
}

impl MemoryObjectStore {
    /// Create a new empty memory store without a quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that holds at most `quota` bytes of values.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            records: RwLock::default(),
            quota: Some(quota),
        }
    }

    /// Keys currently stored, ascending.
    pub fn keys(&self) -> Vec<RecordKey> {
        self.records
            .read()
            .map(|records| records.keys().copied().collect())
            .unwrap_or_default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl ObjectStore for MemoryObjectStore {
    fn open(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn get(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<Option<Vec<u8>>>> {
        Box::pin(async move {
            let records = self.records.read().map_err(lock_error)?;
            Ok(records.get(&key).cloned())
        })
    }

    fn put(&self, key: RecordKey, value: Vec<u8>) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            if let Some(quota) = self.quota {
                let others: usize = records
                    .iter()
                    .filter(|(k, _)| **k != key)
                    .map(|(_, v)| v.len())
                    .sum();
                if others + value.len() > quota {
                    return Err(StorageError::QuotaExceeded(format!("record {}", key)));
                }
            }
            records.insert(key, value);
            Ok(())
        })
    }

    fn delete(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            records.remove(&key);
            Ok(())
        })
    }

    fn wipe(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut records = self.records.write().map_err(lock_error)?;
            records.clear();
            Ok(())
        })
    }
}

/// In-memory scalar store with an optional byte quota over keys and values.
#[derive(Debug, Default, Clone)]
pub struct MemoryScalarStore {
    values: HashMap<String, ScalarValue>,
    quota: Option<usize>,
}

impl MemoryScalarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            values: HashMap::new(),
            quota: Some(quota),
        }
    }

    fn used_without(&self, key: &str) -> usize {
        self.values
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.stored_len())
            .sum()
    }
}

impl ScalarStore for MemoryScalarStore {
    fn get(&self, key: &str) -> StorageResult<Option<ScalarValue>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: ScalarValue) -> StorageResult<()> {
        if let Some(quota) = self.quota {
            if self.used_without(key) + key.len() + value.stored_len() > quota {
                return Err(StorageError::QuotaExceeded(key.to_string()));
            }
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.values.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.values.keys().cloned().collect())
    }
}
