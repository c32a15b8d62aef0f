//! IndexedDB history store for WebAssembly.
//!
//! Each map instance gets its own database (`map_<name>`) with a single
//! object store whose records are `{ key, value }` objects keyed by `key`.

use super::{BoxFuture, ObjectStore, RecordKey, StorageError, StorageResult};
use js_sys::{Object, Reflect, Uint8Array};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{IdbDatabase, IdbFactory, IdbObjectStore, IdbObjectStoreParameters, IdbRequest, IdbTransactionMode};

const DB_VERSION: u32 = 1;
const STORE_NAME: &str = "map";

/// IndexedDB-based history store.
///
/// Note: This is intentionally not Send/Sync since WASM is single-threaded
/// and IndexedDB handles are not thread-safe.
pub struct IndexedDbObjectStore {
    db_name: String,
    /// Database connection, set once `open` completes.
    db: Rc<RefCell<Option<IdbDatabase>>>,
}

impl IndexedDbObjectStore {
    /// Create a store for the named map instance. Call `open` before use.
    pub fn new(instance: &str) -> Self {
        Self {
            db_name: format!("map_{}", instance),
            db: Rc::new(RefCell::new(None)),
        }
    }

    fn factory() -> StorageResult<IdbFactory> {
        let window = web_sys::window().ok_or_else(|| StorageError::Other("No window object".to_string()))?;
        window
            .indexed_db()
            .map_err(|e| StorageError::Other(format!("IndexedDB error: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("IndexedDB not available".to_string()))
    }

    async fn open_db(&self) -> StorageResult<IdbDatabase> {
        let open_request = Self::factory()?
            .open_with_u32(&self.db_name, DB_VERSION)
            .map_err(|e| StorageError::Other(format!("Failed to open DB: {:?}", e)))?;

        let onupgrade = Closure::once(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
            log::info!("Upgrading history database");
            let Some(target) = event.target() else { return };
            let request: IdbRequest = target.unchecked_into();
            let Ok(result) = request.result() else { return };
            let db: IdbDatabase = result.unchecked_into();
            if !db.object_store_names().contains(STORE_NAME) {
                let params = IdbObjectStoreParameters::new();
                params.set_key_path(&JsValue::from_str("key"));
                if let Err(e) = db.create_object_store_with_optional_parameters(STORE_NAME, &params) {
                    log::error!("Failed to create object store: {:?}", e);
                }
            }
        }) as Box<dyn FnOnce(_)>);

        open_request.set_onupgradeneeded(Some(onupgrade.as_ref().unchecked_ref()));
        onupgrade.forget(); // Let JS handle cleanup

        await_idb_request::<IdbDatabase>(&open_request).await
    }

    fn store(&self, mode: IdbTransactionMode) -> StorageResult<IdbObjectStore> {
        let db = self.db.borrow();
        let db = db
            .as_ref()
            .ok_or_else(|| StorageError::Other("Database is not open".to_string()))?;
        let transaction = db
            .transaction_with_str_and_mode(STORE_NAME, mode)
            .map_err(|e| StorageError::Other(format!("Transaction error: {:?}", e)))?;
        transaction
            .object_store(STORE_NAME)
            .map_err(|e| StorageError::Other(format!("Store error: {:?}", e)))
    }
}

impl ObjectStore for IndexedDbObjectStore {
    fn open(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            if self.db.borrow().is_some() {
                return Ok(());
            }
            let db = self.open_db().await?;
            log::info!("Opened history database {}", self.db_name);
            *self.db.borrow_mut() = Some(db);
            Ok(())
        })
    }

    fn get(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<Option<Vec<u8>>>> {
        Box::pin(async move {
            let store = self.store(IdbTransactionMode::Readonly)?;
            let request = store
                .get(&JsValue::from_f64(key as f64))
                .map_err(|e| StorageError::Other(format!("Get error: {:?}", e)))?;

            let result = await_idb_request::<JsValue>(&request).await?;
            if result.is_undefined() || result.is_null() {
                return Ok(None);
            }

            let value = Reflect::get(&result, &JsValue::from_str("value"))
                .map_err(|_| StorageError::Serialization("Record has no value".to_string()))?;
            let bytes = value
                .dyn_into::<Uint8Array>()
                .map_err(|_| StorageError::Serialization("Record value is not bytes".to_string()))?;
            Ok(Some(bytes.to_vec()))
        })
    }

    fn put(&self, key: RecordKey, value: Vec<u8>) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let store = self.store(IdbTransactionMode::Readwrite)?;

            let record = Object::new();
            let set = |name: &str, v: &JsValue| {
                Reflect::set(&record, &JsValue::from_str(name), v)
                    .map_err(|e| StorageError::Serialization(format!("Record error: {:?}", e)))
            };
            set("key", &JsValue::from_f64(key as f64))?;
            set("value", &Uint8Array::from(value.as_slice()).into())?;

            let request = store
                .put(&record)
                .map_err(|e| StorageError::Other(format!("Put error: {:?}", e)))?;
            await_idb_request::<JsValue>(&request).await?;
            log::debug!("Stored history record {}", key);
            Ok(())
        })
    }

    fn delete(&self, key: RecordKey) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let store = self.store(IdbTransactionMode::Readwrite)?;
            let request = store
                .delete(&JsValue::from_f64(key as f64))
                .map_err(|e| StorageError::Other(format!("Delete error: {:?}", e)))?;
            await_idb_request::<JsValue>(&request).await?;
            Ok(())
        })
    }

    fn wipe(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            if let Some(db) = self.db.borrow_mut().take() {
                db.close();
            }
            let request = Self::factory()?
                .delete_database(&self.db_name)
                .map_err(|e| StorageError::Other(format!("Delete database error: {:?}", e)))?;
            await_idb_request::<JsValue>(&request).await?;
            log::info!("Deleted history database {}", self.db_name);

            let db = self.open_db().await?;
            *self.db.borrow_mut() = Some(db);
            Ok(())
        })
    }
}

/// Helper to await an IndexedDB request using a Promise.
///
/// A rejected request carries the DOMException name so quota failures can be
/// told apart from other faults.
async fn await_idb_request<T: JsCast>(request: &IdbRequest) -> StorageResult<T> {
    use wasm_bindgen_futures::JsFuture;

    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        let onsuccess = Closure::once(Box::new(move |event: web_sys::Event| {
            let result = event
                .target()
                .map(|t| t.unchecked_into::<IdbRequest>())
                .and_then(|r| r.result().ok())
                .unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::NULL, &result);
        }) as Box<dyn FnOnce(_)>);

        let onerror = Closure::once(Box::new(move |event: web_sys::Event| {
            let name = event
                .target()
                .map(|t| t.unchecked_into::<IdbRequest>())
                .and_then(|r| r.error().ok().flatten())
                .map(|e| e.name())
                .unwrap_or_else(|| "UnknownError".to_string());
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str(&name));
        }) as Box<dyn FnOnce(_)>);

        request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
        request.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        onsuccess.forget();
        onerror.forget();
    });

    let value = JsFuture::from(promise).await.map_err(|e| match e.as_string().as_deref() {
        Some("QuotaExceededError") => StorageError::QuotaExceeded("IndexedDB record".to_string()),
        Some(name) => StorageError::Other(format!("IndexedDB request failed: {}", name)),
        None => StorageError::Other(format!("IndexedDB request failed: {:?}", e)),
    })?;
    value
        .dyn_into::<T>()
        .map_err(|_| StorageError::Other("Type conversion failed".to_string()))
}
