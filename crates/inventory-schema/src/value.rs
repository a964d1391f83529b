//! Typed intermediate values produced by validation.
//!
//! Validation never hands around untyped maps: every predicate yields a
//! [`FieldValue`], and an entry under construction is a [`Record`] keyed by
//! predicate name with explicit merge rules (see [`Record::merge_value`]).

use crate::dates;
use crate::uid::NodeRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn to_geojson(&self) -> JsonValue {
        json!({ "type": "Point", "coordinates": [self.longitude, self.latitude] })
    }
}

/// A single scalar or node reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Geo(GeoPoint),
    Node(NodeRef),
    Password(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// JSON form as the graph store returns it in query results.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String(s) | Value::Password(s) => JsonValue::String(s.clone()),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Bool(b) => json!(b),
            Value::DateTime(dt) => JsonValue::String(dates::to_storage(dt)),
            Value::Geo(point) => point.to_geojson(),
            Value::Node(NodeRef::Existing(uid)) => json!({ "uid": uid.as_str() }),
            Value::Node(NodeRef::New(blank)) => json!({ "uid": blank.to_string() }),
        }
    }

    /// Raw-input form: what a client would submit to get this value back.
    pub fn to_raw(&self) -> JsonValue {
        match self {
            Value::Geo(point) => json!({ "longitude": point.longitude, "latitude": point.latitude }),
            Value::Node(NodeRef::Existing(uid)) => JsonValue::String(uid.to_string()),
            other => other.to_json(),
        }
    }
}

/// Facets attached to one value or edge instance.
pub type Facets = BTreeMap<String, Value>;

/// A value together with its facets.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub value: Value,
    pub facets: Facets,
}

impl Item {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            facets: Facets::new(),
        }
    }

    pub fn with_facet(mut self, key: impl Into<String>, value: Value) -> Self {
        self.facets.insert(key.into(), value);
        self
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Item::new(value)
    }
}

/// The validated form of one predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Single value; a later value for the same key replaces it.
    Single(Item),
    /// Ordered sequence; later values concatenate.
    List(Vec<Item>),
    /// Unordered, duplicate-free collection; later values union in.
    Set(Vec<Item>),
}

impl FieldValue {
    pub fn single(value: Value) -> Self {
        FieldValue::Single(Item::new(value))
    }

    /// Builds a set, dropping duplicate values (first occurrence wins).
    pub fn set(items: impl IntoIterator<Item = Item>) -> Self {
        let mut out: Vec<Item> = Vec::new();
        for item in items {
            if !out.iter().any(|existing| existing.value == item.value) {
                out.push(item);
            }
        }
        FieldValue::Set(out)
    }

    pub fn items(&self) -> &[Item] {
        match self {
            FieldValue::Single(item) => std::slice::from_ref(item),
            FieldValue::List(items) | FieldValue::Set(items) => items,
        }
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        match self {
            FieldValue::Single(item) => std::slice::from_mut(item),
            FieldValue::List(items) | FieldValue::Set(items) => items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Accumulates `incoming` onto `self`: lists concatenate, sets union,
    /// anything else is replaced by `incoming`.
    pub fn merge(&mut self, incoming: FieldValue) {
        match (self, incoming) {
            (FieldValue::List(current), FieldValue::List(more)) => current.extend(more),
            (FieldValue::Set(current), FieldValue::Set(more)) => {
                for item in more {
                    if !current.iter().any(|existing| existing.value == item.value) {
                        current.push(item);
                    }
                }
            }
            (slot, incoming) => *slot = incoming,
        }
    }

    /// Raw-input form, suitable for feeding back through validation.
    ///
    /// Items whose only facet is the positional `sequence` facet are emitted
    /// as bare values (the position is implied by array order).
    pub fn to_raw(&self) -> JsonValue {
        fn item_raw(item: &Item) -> JsonValue {
            let carries_facets = item.facets.keys().any(|k| k != crate::facets::SEQUENCE_FACET);
            if !carries_facets {
                return item.value.to_raw();
            }
            let mut obj = serde_json::Map::new();
            obj.insert("value".to_string(), item.value.to_raw());
            for (key, value) in &item.facets {
                if key != crate::facets::SEQUENCE_FACET {
                    obj.insert(key.clone(), value.to_raw());
                }
            }
            JsonValue::Object(obj)
        }
        match self {
            FieldValue::Single(item) => item_raw(item),
            FieldValue::List(items) | FieldValue::Set(items) => {
                JsonValue::Array(items.iter().map(item_raw).collect())
            }
        }
    }
}

/// Ordered predicate-name → value mapping for one entry under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, predicate: &str) -> Option<&FieldValue> {
        self.fields.get(predicate)
    }

    pub fn get_mut(&mut self, predicate: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(predicate)
    }

    pub fn contains(&self, predicate: &str) -> bool {
        self.fields.contains_key(predicate)
    }

    /// Replaces whatever is stored under `predicate`.
    pub fn insert(&mut self, predicate: impl Into<String>, value: FieldValue) {
        self.fields.insert(predicate.into(), value);
    }

    pub fn remove(&mut self, predicate: &str) -> Option<FieldValue> {
        self.fields.remove(predicate)
    }

    /// Accumulation rule for a key that may already hold a partial value:
    /// sequences concatenate, sets union, scalars overwrite.
    pub fn merge_value(&mut self, predicate: impl Into<String>, incoming: FieldValue) {
        let predicate = predicate.into();
        match self.fields.get_mut(&predicate) {
            Some(current) => current.merge(incoming),
            None => {
                self.fields.insert(predicate, incoming);
            }
        }
    }

    /// Merges a mapping result key-wise, each key following [`Self::merge_value`].
    pub fn merge_record(&mut self, other: Record) {
        for (key, value) in other.fields {
            self.merge_value(key, value);
        }
    }

    /// First string value stored under `predicate`.
    pub fn str_value(&self, predicate: &str) -> Option<&str> {
        self.get(predicate)
            .and_then(|v| v.items().first())
            .and_then(|item| item.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An entry headed for the store: the node it targets plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub node: NodeRef,
    pub fields: Record,
}

impl Entry {
    pub fn new(node: NodeRef) -> Self {
        Self {
            node,
            fields: Record::new(),
        }
    }

    /// Type tags currently assigned under `dgraph.type`.
    pub fn types(&self) -> Vec<&str> {
        self.fields
            .get(crate::schema::TYPE_PREDICATE)
            .map(|v| v.items().iter().filter_map(|i| i.value.as_str()).collect())
            .unwrap_or_default()
    }
}
