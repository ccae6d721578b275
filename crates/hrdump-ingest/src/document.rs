//! In-memory export document
//!
//! A mapping from collection name to an ordered list of items, plus named
//! sub-documents (e.g. `codility`). Collections are only ever created or
//! extended while a run is in progress.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Arbitrary JSON tree fetched from an API.
pub type Item = Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    collections: BTreeMap<String, Vec<Item>>,
    sections: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Create `name` as an empty collection unless it already exists.
    pub fn ensure_collection(&mut self, name: &str) -> &mut Vec<Item> {
        self.collections.entry(name.to_string()).or_default()
    }

    pub fn collection(&self, name: &str) -> Option<&[Item]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Vec<Item>> {
        self.collections.get_mut(name)
    }

    /// Append `items` to `name`, creating the collection if needed.
    pub fn extend(&mut self, name: &str, items: impl IntoIterator<Item = Item>) {
        self.ensure_collection(name).extend(items);
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Attach a nested sub-document such as the assessment export.
    pub fn insert_section(&mut self, name: &str, value: Value) {
        self.sections.insert(name.to_string(), value);
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Item counts per collection, for logging.
    pub fn counts(&self) -> BTreeMap<&str, usize> {
        self.collections
            .iter()
            .map(|(name, items)| (name.as_str(), items.len()))
            .collect()
    }

    /// The document as a single JSON object.
    pub fn into_value(self) -> Value {
        let mut map = Map::new();
        for (name, items) in self.collections {
            map.insert(name, Value::Array(items));
        }
        for (name, section) in self.sections {
            map.insert(name, section);
        }
        Value::Object(map)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().into_value().serialize(serializer)
    }
}

/// Stringified id as used for matching items: strings verbatim, other
/// scalars in their JSON form. Missing, null and non-scalar ids yield `None`.
pub fn item_id(item: &Item, id_field: &str) -> Option<String> {
    match item.get(id_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First item whose stringified `id_field` equals `id`.
pub fn find_item_mut<'a>(items: &'a mut [Item], id_field: &str, id: &str) -> Option<&'a mut Item> {
    items
        .iter_mut()
        .find(|item| item_id(item, id_field).as_deref() == Some(id))
}
