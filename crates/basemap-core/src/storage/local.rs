//! Browser `localStorage` scalar store for WebAssembly.

use super::{ScalarStore, ScalarValue, StorageError, StorageResult};
use web_sys::Storage;

/// Scalar store backed by `window.localStorage`.
///
/// Values are stored as strings; numbers are recognised again on read.
pub struct LocalStorageScalarStore {
    storage: Storage,
}

impl LocalStorageScalarStore {
    pub fn new() -> StorageResult<Self> {
        let window = web_sys::window().ok_or_else(|| StorageError::Other("No window object".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Other(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("localStorage not available".to_string()))?;
        Ok(Self { storage })
    }
}

impl ScalarStore for LocalStorageScalarStore {
    fn get(&self, key: &str) -> StorageResult<Option<ScalarValue>> {
        let value = self
            .storage
            .get_item(key)
            .map_err(|e| StorageError::Other(format!("getItem error: {:?}", e)))?;
        Ok(value.map(|text| match text.parse::<f64>() {
            Ok(n) if n.to_string() == text => ScalarValue::Number(n),
            _ => ScalarValue::Text(text),
        }))
    }

    fn set(&mut self, key: &str, value: ScalarValue) -> StorageResult<()> {
        let text = match value {
            ScalarValue::Number(n) => n.to_string(),
            ScalarValue::Text(s) => s,
        };
        // Browsers throw QuotaExceededError here; nothing else is expected.
        self.storage
            .set_item(key, &text)
            .map_err(|_| StorageError::QuotaExceeded(key.to_string()))
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| StorageError::Other(format!("removeItem error: {:?}", e)))
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let len = self
            .storage
            .length()
            .map_err(|e| StorageError::Other(format!("localStorage error: {:?}", e)))?;
        let mut keys = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Ok(Some(key)) = self.storage.key(i) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
