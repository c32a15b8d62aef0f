//! Storage abstraction for persistence.
//!
//! Two stores back a viewport: an object store holding compressed history
//! snapshots keyed by history index, and a flat scalar store holding camera
//! and history-window state.

mod compress;
mod memory;
mod session;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod indexeddb;

#[cfg(target_arch = "wasm32")]
mod local;

pub use compress::{Compressor, PassthroughCompressor, default_compressor};
#[cfg(not(target_arch = "wasm32"))]
pub use compress::ZstdCompressor;
pub use memory::{MemoryObjectStore, MemoryScalarStore};
pub use session::{SessionKey, SessionStore};

#[cfg(not(target_arch = "wasm32"))]
pub use file::{FileObjectStore, FileScalarStore};

#[cfg(target_arch = "wasm32")]
pub use indexeddb::IndexedDbObjectStore;

#[cfg(target_arch = "wasm32")]
pub use local::LocalStorageScalarStore;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage quota exceeded writing {0}")]
    QuotaExceeded(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Key of a history snapshot record.
pub type RecordKey = u64;

/// Trait for history snapshot backends.
///
/// `get` distinguishes an absent record (`Ok(None)`) from a stored empty
/// snapshot. Implementations are opened once before use.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait ObjectStore: Send + Sync {
    /// Open the store, creating it if needed.
    fn open(&self) -> BoxFuture<'_, StorageResult<()>>;

    /// Read a record.
    fn get(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<Option<Vec<u8>>>>;

    /// Write a record, replacing any existing value.
    fn put(&self, key: RecordKey, value: Vec<u8>) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete a record. Deleting an absent record succeeds.
    fn delete(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every record and recreate the store.
    fn wipe(&self) -> BoxFuture<'_, StorageResult<()>>;
}

/// Trait for history snapshot backends (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait ObjectStore {
    /// Open the store, creating it if needed.
    fn open(&self) -> BoxFuture<'_, StorageResult<()>>;

    /// Read a record.
    fn get(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<Option<Vec<u8>>>>;

    /// Write a record, replacing any existing value.
    fn put(&self, key: RecordKey, value: Vec<u8>) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete a record. Deleting an absent record succeeds.
    fn delete(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<()>>;

    /// Delete every record and recreate the store.
    fn wipe(&self) -> BoxFuture<'_, StorageResult<()>>;
}

/// A value in the scalar store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Number(f64),
    Text(String),
}

impl ScalarValue {
    /// Numeric view, parsing text that holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => Some(*n),
            ScalarValue::Text(s) => s.parse().ok(),
        }
    }

    /// Approximate stored size in bytes, used by quota accounting.
    pub fn stored_len(&self) -> usize {
        match self {
            ScalarValue::Number(n) => n.to_string().len(),
            ScalarValue::Text(s) => s.len(),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Number(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

/// Flat, synchronous key-value store.
///
/// `set` may fail with [`StorageError::QuotaExceeded`]; callers decide how to
/// free space.
pub trait ScalarStore {
    fn get(&self, key: &str) -> StorageResult<Option<ScalarValue>>;

    fn set(&mut self, key: &str, value: ScalarValue) -> StorageResult<()>;

    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// All keys currently stored.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
