use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

/// One previously created object instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectEntry {
    pub id: String,
    pub label: String,
    pub data: Value,
}

impl ObjectEntry {
    /// The `{id, label, data}` object stored in a parent field.
    pub fn as_reference(&self) -> Value {
        json!({
            "id": self.id,
            "label": self.label,
            "data": self.data,
        })
    }
}

/// Catalogue of created objects keyed by object-type name.
///
/// Entries are only ever appended. Ids are unique for the lifetime of the
/// catalogue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectDataSource {
    #[serde(flatten)]
    entries: IndexMap<String, Vec<ObjectEntry>>,
    #[serde(skip)]
    next_id: u64,
}

impl ObjectDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries created for `type_name`, oldest first.
    pub fn entries(&self, type_name: &str) -> &[ObjectEntry] {
        self.entries.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Type names that have at least one entry.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find an entry by id in any type.
    pub fn find(&self, id: &str) -> Option<&ObjectEntry> {
        self.entries.values().flatten().find(|e| e.id == id)
    }

    /// Append a new entry with a fresh `<prefix>_<n>` id.
    pub fn append(
        &mut self,
        type_name: &str,
        id_prefix: &str,
        label: String,
        data: Value,
    ) -> ObjectEntry {
        self.next_id += 1;
        let entry = ObjectEntry {
            id: format!("{id_prefix}_{}", self.next_id),
            label,
            data,
        };
        self.entries
            .entry(type_name.to_string())
            .or_default()
            .push(entry.clone());
        entry
    }
}

/// Callback notified with the catalogue after every append.
pub type UpdateCallback = Rc<dyn Fn(&ObjectDataSource)>;

/// Handle to one [`ObjectDataSource`] shared by a root form and every nested
/// creation context beneath it.
///
/// Cloning the handle shares the catalogue; it never copies it.
#[derive(Clone, Default)]
pub struct SharedDataSource {
    inner: Rc<RefCell<ObjectDataSource>>,
    listeners: Rc<RefCell<Vec<UpdateCallback>>>,
}

impl SharedDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked after each append.
    pub fn on_update(&self, callback: UpdateCallback) {
        self.listeners.borrow_mut().push(callback);
    }

    /// Read the catalogue.
    pub fn with<R>(&self, f: impl FnOnce(&ObjectDataSource) -> R) -> R {
        f(&self.inner.borrow())
    }

    /// Copy of the current catalogue.
    pub fn snapshot(&self) -> ObjectDataSource {
        self.inner.borrow().clone()
    }

    /// Append an entry and notify listeners.
    ///
    /// Listeners receive a copy taken right after the append and run with no
    /// borrow held, so they may append through another handle.
    pub fn append(&self, type_name: &str, id_prefix: &str, label: String, data: Value) -> ObjectEntry {
        let entry = self
            .inner
            .borrow_mut()
            .append(type_name, id_prefix, label, data);
        debug!("data source: appended {} to {type_name:?}", entry.id);

        let listeners = self.listeners.borrow().clone();
        if !listeners.is_empty() {
            let current = self.snapshot();
            for listener in &listeners {
                listener(&current);
            }
        }
        entry
    }

    /// Whether both handles point at the same catalogue.
    pub fn ptr_eq(&self, other: &SharedDataSource) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SharedDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDataSource")
            .field("inner", &self.inner.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_append_assigns_unique_ids() {
        let mut source = ObjectDataSource::new();
        let a = source.append("Address", "custom", "a".into(), json!({"city": "x"}));
        let b = source.append("Person", "nested", "b".into(), json!({"name": "y"}));
        let c = source.append("Address", "custom", "c".into(), json!({"city": "z"}));

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_ne!(b.id, c.id);
        assert_eq!(source.entries("Address").len(), 2);
        assert!(source.entries("Missing").is_empty());
        assert_eq!(source.len(), 3);
        assert_eq!(source.find(&b.id), Some(&b));
        assert_eq!(source.type_names().collect::<Vec<_>>(), vec!["Address", "Person"]);
    }

    #[test]
    fn test_reference_object() {
        let entry = ObjectEntry {
            id: "custom_1".into(),
            label: "x (Custom)".into(),
            data: json!({"name": "x"}),
        };
        assert_eq!(
            entry.as_reference(),
            json!({"id": "custom_1", "label": "x (Custom)", "data": {"name": "x"}})
        );
    }

    #[test]
    fn test_shared_handle_writes_through() {
        let root = SharedDataSource::new();
        let child = root.clone();
        assert!(root.ptr_eq(&child));

        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        root.on_update(Rc::new(move |ds: &ObjectDataSource| counter.set(ds.len())));

        child.append("T", "nested", "l".into(), json!({}));
        assert_eq!(root.with(|ds| ds.len()), 1);
        assert_eq!(seen.get(), 1);
        assert_eq!(root.snapshot().entries("T").len(), 1);
    }

    #[test]
    fn test_serializes_as_type_map() {
        let mut source = ObjectDataSource::new();
        source.append("T", "custom", "l".into(), json!({"a": 1}));
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value, json!({"T": [{"id": "custom_1", "label": "l", "data": {"a": 1}}]}));
    }

    #[test]
    fn test_listener_may_append() {
        let source = SharedDataSource::new();
        let handle = source.clone();
        source.on_update(Rc::new(move |ds: &ObjectDataSource| {
            if ds.entries("Audit").is_empty() {
                handle.append("Audit", "custom", "log".into(), json!({"count": ds.len()}));
            }
        }));

        source.append("Person", "custom", "ada".into(), json!({"name": "ada"}));
        source.with(|ds| {
            assert_eq!(ds.len(), 2);
            assert_eq!(ds.entries("Audit")[0].data, json!({"count": 1}));
        });
    }
}

