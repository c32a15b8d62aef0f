//! File-based storage implementation for native platforms.

use super::{BoxFuture, ObjectStore, RecordKey, ScalarStore, ScalarValue, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Turn an instance name into something safe to use as a file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Base directory for a named map instance.
///
/// On Unix: `~/.local/share/basemap/<name>/`
/// On Windows: `%LOCALAPPDATA%\basemap\<name>\`
fn instance_dir(name: &str) -> StorageResult<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
    Ok(base.join("basemap").join(sanitize(name)))
}

/// File-based history store.
///
/// Each record is one file named after its key inside the store directory.
pub struct FileObjectStore {
    /// Directory holding the record files.
    base_path: PathBuf,
}

impl FileObjectStore {
    /// Create a store rooted at `base_path`. The directory is created on `open`.
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Store in the default location for a named map instance.
    pub fn default_location(name: &str) -> StorageResult<Self> {
        Ok(Self::new(instance_dir(name)?.join("map")))
    }

    fn record_path(&self, key: RecordKey) -> PathBuf {
        self.base_path.join(format!("{}.bin", key))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

impl ObjectStore for FileObjectStore {
    fn open(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            fs::create_dir_all(&self.base_path).map_err(|e| {
                StorageError::Io(format!(
                    "Failed to create store directory {}: {}",
                    self.base_path.display(),
                    e
                ))
            })?;
            log::info!("Opened history store at {}", self.base_path.display());
            Ok(())
        })
    }

    fn get(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<Option<Vec<u8>>>> {
        let path = self.record_path(key);
        Box::pin(async move {
            match fs::read(&path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Io(format!("Failed to read {}: {}", path.display(), e))),
            }
        })
    }

    fn put(&self, key: RecordKey, value: Vec<u8>) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(key);
        Box::pin(async move {
            fs::write(&path, value).map_err(|e| {
                if e.kind() == ErrorKind::StorageFull {
                    StorageError::QuotaExceeded(path.display().to_string())
                } else {
                    StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
                }
            })
        })
    }

    fn delete(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.record_path(key);
        Box::pin(async move {
            match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))),
            }
        })
    }

    fn wipe(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            if self.base_path.exists() {
                fs::remove_dir_all(&self.base_path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", self.base_path.display(), e))
                })?;
            }
            fs::create_dir_all(&self.base_path).map_err(|e| {
                StorageError::Io(format!("Failed to recreate {}: {}", self.base_path.display(), e))
            })?;
            log::info!("Wiped history store at {}", self.base_path.display());
            Ok(())
        })
    }
}

/// Scalar store persisted as a JSON object in a single file.
///
/// The whole map is rewritten on every change.
pub struct FileScalarStore {
    path: PathBuf,
    values: BTreeMap<String, ScalarValue>,
}

impl FileScalarStore {
    /// Open the store at `path`, reading existing values if the file exists.
    pub fn open(path: PathBuf) -> StorageResult<Self> {
        let values = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StorageError::Io(format!("Failed to read {}: {}", path.display(), e)));
            }
        };
        Ok(Self { path, values })
    }

    /// Store in the default location for a named map instance.
    pub fn default_location(name: &str) -> StorageResult<Self> {
        Self::open(instance_dir(name)?.join("session.json"))
    }

    fn flush(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(&self.values)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| {
            if e.kind() == ErrorKind::StorageFull {
                StorageError::QuotaExceeded(self.path.display().to_string())
            } else {
                StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e))
            }
        })
    }
}

impl ScalarStore for FileScalarStore {
    fn get(&self, key: &str) -> StorageResult<Option<ScalarValue>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: ScalarValue) -> StorageResult<()> {
        let previous = self.values.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // Keep memory and disk in agreement when the write fails.
            match previous {
                Some(previous) => self.values.insert(key.to_string(), previous),
                None => self.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.values.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_put_get() {
        let dir = tempdir().unwrap();
        let store = FileObjectStore::new(dir.path().join("map"));
        block_on(store.open()).unwrap();

        block_on(store.put(3, vec![9, 8, 7])).unwrap();
        assert_eq!(block_on(store.get(3)).unwrap(), Some(vec![9, 8, 7]));
        assert_eq!(block_on(store.get(4)).unwrap(), None);
    }

    #[test]
    fn test_file_store_delete_and_wipe() {
        let dir = tempdir().unwrap();
        let store = FileObjectStore::new(dir.path().join("map"));
        block_on(store.open()).unwrap();

        block_on(store.put(1, vec![1])).unwrap();
        block_on(store.put(2, vec![2])).unwrap();
        block_on(store.delete(1)).unwrap();
        block_on(store.delete(1)).unwrap();
        assert_eq!(block_on(store.get(1)).unwrap(), None);

        block_on(store.wipe()).unwrap();
        assert_eq!(block_on(store.get(2)).unwrap(), None);
        assert!(store.base_path().exists());
    }

    #[test]
    fn test_scalar_file_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = FileScalarStore::open(path.clone()).unwrap();
        store.set("main:scale", ScalarValue::Number(0.5)).unwrap();
        store.set("main:label", ScalarValue::from("hello")).unwrap();
        store.remove("main:label").unwrap();

        let reopened = FileScalarStore::open(path).unwrap();
        assert_eq!(reopened.get("main:scale").unwrap(), Some(ScalarValue::Number(0.5)));
        assert_eq!(reopened.get("main:label").unwrap(), None);
    }

    #[test]
    fn test_scalar_file_rejects_corrupt_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ nope").unwrap();

        let result = FileScalarStore::open(path);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_sanitize_instance_name() {
        assert_eq!(sanitize("notes/board:1"), "notes_board_1");
    }
}
