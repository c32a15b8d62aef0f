//! Namespaced, typed view over a scalar store.

use super::{ScalarStore, ScalarValue, StorageResult};
use crate::history::HistoryIndex;
use kurbo::Vec2;

/// Logical keys a viewport persists in the scalar store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    OffsetX,
    OffsetY,
    Scale,
    SaveMin,
    SaveCur,
    SaveMax,
}

impl SessionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::OffsetX => "offsetX",
            SessionKey::OffsetY => "offsetY",
            SessionKey::Scale => "scale",
            SessionKey::SaveMin => "saveMinI",
            SessionKey::SaveCur => "saveCurI",
            SessionKey::SaveMax => "saveMaxI",
        }
    }
}

/// Camera and history-window state for one map instance.
///
/// All keys are prefixed with the instance name, so several instances can
/// share one backing store without colliding.
#[derive(Debug)]
pub struct SessionStore<S: ScalarStore> {
    namespace: String,
    store: S,
}

impl<S: ScalarStore> SessionStore<S> {
    pub fn new(namespace: impl Into<String>, store: S) -> Self {
        Self {
            namespace: namespace.into(),
            store,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Fully qualified key in the backing store.
    pub fn key(&self, key: SessionKey) -> String {
        format!("{}{}", self.prefix(), key.as_str())
    }

    /// Read a numeric value. Read faults are logged and treated as absent.
    pub fn number(&self, key: SessionKey) -> Option<f64> {
        match self.store.get(&self.key(key)) {
            Ok(value) => value.and_then(|v| v.as_f64()).filter(|n| n.is_finite()),
            Err(e) => {
                log::warn!("Failed to read {}: {}", self.key(key), e);
                None
            }
        }
    }

    pub fn set_number(&mut self, key: SessionKey, value: f64) -> StorageResult<()> {
        let full = self.key(key);
        self.store.set(&full, ScalarValue::Number(value))
    }

    /// Persisted camera offset, if both components are present.
    pub fn offset(&self) -> Option<Vec2> {
        Some(Vec2::new(
            self.number(SessionKey::OffsetX)?,
            self.number(SessionKey::OffsetY)?,
        ))
    }

    pub fn set_offset(&mut self, offset: Vec2) -> StorageResult<()> {
        self.set_number(SessionKey::OffsetX, offset.x)?;
        self.set_number(SessionKey::OffsetY, offset.y)
    }

    pub fn scale(&self) -> Option<f64> {
        self.number(SessionKey::Scale).filter(|s| *s > 0.0)
    }

    pub fn set_scale(&mut self, scale: f64) -> StorageResult<()> {
        self.set_number(SessionKey::Scale, scale)
    }

    fn index_value(&self, key: SessionKey) -> Option<u64> {
        self.number(key).filter(|n| *n >= 0.0).map(|n| n as u64)
    }

    /// Persisted history window, falling back to the initial window per field.
    pub fn history_index(&self) -> HistoryIndex {
        let initial = HistoryIndex::initial();
        HistoryIndex {
            min: self
                .index_value(SessionKey::SaveMin)
                .filter(|min| *min >= 1)
                .unwrap_or(initial.min),
            cur: self.index_value(SessionKey::SaveCur).unwrap_or(initial.cur),
            max: self.index_value(SessionKey::SaveMax).unwrap_or(initial.max),
        }
    }

    pub fn set_history_index(&mut self, index: &HistoryIndex) -> StorageResult<()> {
        self.set_number(SessionKey::SaveMin, index.min as f64)?;
        self.set_number(SessionKey::SaveCur, index.cur as f64)?;
        self.set_number(SessionKey::SaveMax, index.max as f64)
    }

    /// Remove every key belonging to this namespace.
    pub fn clear(&mut self) -> StorageResult<()> {
        let prefix = self.prefix();
        for key in self.store.keys()? {
            if key.starts_with(&prefix) {
                self.store.remove(&key)?;
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryScalarStore;

    #[test]
    fn test_keys_are_namespaced() {
        let session = SessionStore::new("notes", MemoryScalarStore::new());
        assert_eq!(session.key(SessionKey::Scale), "notes:scale");
        assert_eq!(session.key(SessionKey::SaveCur), "notes:saveCurI");
    }

    #[test]
    fn test_offset_roundtrip() {
        let mut session = SessionStore::new("a", MemoryScalarStore::new());
        assert_eq!(session.offset(), None);

        session.set_offset(Vec2::new(-5.5, 3.0)).unwrap();
        assert_eq!(session.offset(), Some(Vec2::new(-5.5, 3.0)));
    }

    #[test]
    fn test_history_index_defaults() {
        let session = SessionStore::new("a", MemoryScalarStore::new());
        assert_eq!(session.history_index(), HistoryIndex::initial());
    }

    #[test]
    fn test_history_index_roundtrip() {
        let mut session = SessionStore::new("a", MemoryScalarStore::new());
        let index = HistoryIndex { min: 2, cur: 5, max: 7 };
        session.set_history_index(&index).unwrap();
        assert_eq!(session.history_index(), index);
    }

    #[test]
    fn test_text_numbers_are_read() {
        let mut store = MemoryScalarStore::new();
        store.set("a:scale", ScalarValue::from("2.5")).unwrap();
        let session = SessionStore::new("a", store);
        assert_eq!(session.scale(), Some(2.5));
    }

    #[test]
    fn test_clear_only_touches_namespace() {
        let mut store = MemoryScalarStore::new();
        store.set("b:scale", ScalarValue::Number(3.0)).unwrap();
        let mut session = SessionStore::new("a", store);
        session.set_scale(2.0).unwrap();
        session.set_offset(Vec2::new(1.0, 1.0)).unwrap();

        session.clear().unwrap();

        assert_eq!(session.scale(), None);
        assert_eq!(session.offset(), None);
        assert_eq!(session.store().get("b:scale").unwrap(), Some(ScalarValue::Number(3.0)));
    }

    #[test]
    fn test_instances_do_not_collide() {
        let mut first = SessionStore::new("ab", MemoryScalarStore::new());
        first.set_scale(2.0).unwrap();
        let store = first.store().clone();
        let second = SessionStore::new("a", store);
        assert_eq!(second.scale(), None);
    }
}
