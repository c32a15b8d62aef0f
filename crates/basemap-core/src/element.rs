//! Tracked elements placed on the map and their persisted form.

use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a tracked element.
pub type ElementId = Uuid;

/// A visual element positioned on the map, in local coordinates.
///
/// The element itself is rendered by the host; the registry only tracks
/// where it is and whether it belongs in saved snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedElement {
    pub id: ElementId,
    /// Element kind, e.g. `"div"`.
    pub tag: String,
    pub position: Point,
    pub size: Size,
    /// Size including any decoration the host adds around the content box.
    pub full_size: Size,
    /// Host-defined classification (CSS class names in a browser host).
    pub classification: String,
    /// Whether this element is included in saved snapshots.
    pub saveable: bool,
}

impl TrackedElement {
    pub fn new(
        tag: impl Into<String>,
        position: Point,
        size: Size,
        classification: impl Into<String>,
        saveable: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag: tag.into(),
            position,
            size,
            full_size: size,
            classification: classification.into(),
            saveable,
        }
    }
}

/// Serializable projection of a saveable element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshotRecord {
    pub tag: String,
    pub pos: [f64; 2],
    pub size: [f64; 2],
    pub classname: String,
    #[serde(rename = "fullSize")]
    pub full_size: [f64; 2],
}

impl ElementSnapshotRecord {
    pub fn from_element(element: &TrackedElement) -> Self {
        Self {
            tag: element.tag.clone(),
            pos: [element.position.x, element.position.y],
            size: [element.size.width, element.size.height],
            classname: element.classification.clone(),
            full_size: [element.full_size.width, element.full_size.height],
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.pos[0], self.pos[1])
    }

    pub fn size(&self) -> Size {
        Size::new(self.size[0], self.size[1])
    }

    pub fn full_size(&self) -> Size {
        Size::new(self.full_size[0], self.full_size[1])
    }
}

/// Serialize records to the JSON array stored in history snapshots.
pub fn serialize_records(records: &[ElementSnapshotRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string(records)
}

/// Parse a JSON array of records.
pub fn deserialize_records(json: &str) -> Result<Vec<ElementSnapshotRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Change notification produced by registry mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Created(ElementId),
    Updated(ElementId),
    /// The removed element is carried along since it is no longer in the registry.
    Deleted(TrackedElement),
}

/// The set of live elements on the map, in insertion order.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    elements: Vec<TrackedElement>,
    events: Vec<RegistryEvent>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct and register a new element.
    pub fn create(
        &mut self,
        tag: impl Into<String>,
        position: Point,
        size: Size,
        classification: impl Into<String>,
        saveable: bool,
    ) -> ElementId {
        let element = TrackedElement::new(tag, position, size, classification, saveable);
        let id = element.id;
        self.add(element);
        id
    }

    /// Register an element. Returns false if an element with the same id is
    /// already registered.
    pub fn add(&mut self, element: TrackedElement) -> bool {
        if self.contains(element.id) {
            return false;
        }
        let id = element.id;
        self.elements.push(element);
        self.events.push(RegistryEvent::Created(id));
        true
    }

    /// Unregister an element. No-op if it is not registered.
    pub fn remove(&mut self, id: ElementId) -> Option<TrackedElement> {
        let index = self.elements.iter().position(|e| e.id == id)?;
        let element = self.elements.remove(index);
        self.events.push(RegistryEvent::Deleted(element.clone()));
        Some(element)
    }

    /// Remove all elements, or only the saveable ones.
    pub fn clear(&mut self, only_saveable: bool) {
        let ids: Vec<ElementId> = self
            .elements
            .iter()
            .filter(|e| !only_saveable || e.saveable)
            .map(|e| e.id)
            .collect();
        for id in ids {
            self.remove(id);
        }
    }

    /// Mutate an element in place. Returns false if it is not registered.
    pub fn update(&mut self, id: ElementId, f: impl FnOnce(&mut TrackedElement)) -> bool {
        let Some(element) = self.elements.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        f(element);
        // The id is the registry key and must survive the update.
        element.id = id;
        self.events.push(RegistryEvent::Updated(id));
        true
    }

    pub fn get(&self, id: ElementId) -> Option<&TrackedElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Records for every saveable element, in insertion order.
    pub fn snapshot(&self) -> Vec<ElementSnapshotRecord> {
        self.elements
            .iter()
            .filter(|e| e.saveable)
            .map(ElementSnapshotRecord::from_element)
            .collect()
    }

    /// Recreate a saveable element from its record.
    pub fn restore(&mut self, record: &ElementSnapshotRecord) -> ElementId {
        let mut element = TrackedElement::new(
            record.tag.clone(),
            record.position(),
            record.size(),
            record.classname.clone(),
            true,
        );
        element.full_size = record.full_size();
        let id = element.id;
        self.add(element);
        id
    }

    /// Take the pending change notifications.
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(registry: &mut ElementRegistry, x: f64) -> ElementId {
        registry.create("div", Point::new(x, 2.0), Size::new(100.0, 50.0), "note", true)
    }

    #[test]
    fn test_create_fires_event() {
        let mut registry = ElementRegistry::new();
        let id = note(&mut registry, 1.0);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.drain_events(), vec![RegistryEvent::Created(id)]);
        assert!(registry.drain_events().is_empty());
    }

    #[test]
    fn test_add_twice_is_rejected() {
        let mut registry = ElementRegistry::new();
        let element = TrackedElement::new("div", Point::ZERO, Size::new(1.0, 1.0), "x", false);

        assert!(registry.add(element.clone()));
        assert!(!registry.add(element));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.drain_events().len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = ElementRegistry::new();
        note(&mut registry, 1.0);
        registry.drain_events();

        assert!(registry.remove(Uuid::new_v4()).is_none());
        assert!(registry.drain_events().is_empty());
    }

    #[test]
    fn test_remove_fires_delete() {
        let mut registry = ElementRegistry::new();
        let id = note(&mut registry, 1.0);
        registry.drain_events();

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(registry.is_empty());
        assert!(matches!(&registry.drain_events()[..], [RegistryEvent::Deleted(e)] if e.id == id));
    }

    #[test]
    fn test_clear_only_saveable_keeps_scratch() {
        let mut registry = ElementRegistry::new();
        note(&mut registry, 1.0);
        let marker = registry.create("div", Point::ZERO, Size::new(10.0, 10.0), "debug", false);
        note(&mut registry, 3.0);

        registry.clear(true);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(marker));

        registry.clear(false);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_keeps_id() {
        let mut registry = ElementRegistry::new();
        let id = note(&mut registry, 1.0);
        registry.drain_events();

        let updated = registry.update(id, |e| {
            e.position = Point::new(9.0, 9.0);
            e.id = Uuid::new_v4();
        });

        assert!(updated);
        assert_eq!(registry.get(id).unwrap().position, Point::new(9.0, 9.0));
        assert_eq!(registry.drain_events(), vec![RegistryEvent::Updated(id)]);
        assert!(!registry.update(Uuid::new_v4(), |_| {}));
    }

    #[test]
    fn test_snapshot_order_and_filter() {
        let mut registry = ElementRegistry::new();
        note(&mut registry, 1.0);
        registry.create("span", Point::ZERO, Size::new(10.0, 10.0), "debug", false);
        note(&mut registry, 2.0);
        note(&mut registry, 3.0);

        let xs: Vec<f64> = registry.snapshot().iter().map(|r| r.pos[0]).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_record_json_shape() {
        let mut element = TrackedElement::new(
            "div",
            Point::new(1.5, -2.0),
            Size::new(30.0, 40.0),
            "note selected",
            true,
        );
        element.full_size = Size::new(34.0, 44.0);

        let json = serialize_records(&[ElementSnapshotRecord::from_element(&element)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["tag"], "div");
        assert_eq!(value[0]["pos"], serde_json::json!([1.5, -2.0]));
        assert_eq!(value[0]["size"], serde_json::json!([30.0, 40.0]));
        assert_eq!(value[0]["classname"], "note selected");
        assert_eq!(value[0]["fullSize"], serde_json::json!([34.0, 44.0]));
    }

    #[test]
    fn test_restore_preserves_geometry() {
        let mut source = ElementRegistry::new();
        note(&mut source, 7.25);
        source.create("img", Point::new(-3.0, 0.125), Size::new(8.0, 9.0), "photo", true);

        let json = serialize_records(&source.snapshot()).unwrap();
        let records = deserialize_records(&json).unwrap();

        let mut target = ElementRegistry::new();
        for record in &records {
            target.restore(record);
        }
        assert_eq!(target.snapshot(), source.snapshot());
        assert!(target.iter().all(|e| e.saveable));
    }

    #[test]
    fn test_restore_keeps_full_size() {
        let mut source = ElementRegistry::new();
        let id = note(&mut source, 0.0);
        source.update(id, |e| e.full_size = Size::new(120.0, 80.0));

        let mut target = ElementRegistry::new();
        let restored = target.restore(&source.snapshot()[0]);

        assert_eq!(target.get(restored).map(|e| e.full_size), Some(Size::new(120.0, 80.0)));
        assert_eq!(target.snapshot(), source.snapshot());
    }
}
