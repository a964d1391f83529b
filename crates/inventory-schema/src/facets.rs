//! Facet side-channel encoding.
//!
//! The store returns facets on list values as side-channel maps keyed by
//! element position:
//!
//! ```text
//! "audience_size":       ["2020-01-01T00:00:00Z", "2021-01-01T00:00:00Z"],
//! "audience_size|unit":  {"0": "followers", "1": "followers"},
//! "audience_size|count": {"0": 1200, "1": 1800}
//! ```
//!
//! [`split_facets`] produces that shape from validated items and
//! [`fold_facets`] turns it back into one mapping per element. The two are
//! exact inverses up to key order.

use crate::value::Item;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};

/// Positional facet used by ordered lists.
pub const SEQUENCE_FACET: &str = "sequence";

/// Key under which [`fold_facets`] stores the element's own value.
pub const VALUE_KEY: &str = "value";

pub fn side_channel_key(predicate: &str, facet: &str) -> String {
    format!("{predicate}|{facet}")
}

/// One mapping per element: the value under [`VALUE_KEY`] plus its facets.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldedFacets {
    pub elements: Vec<BTreeMap<String, JsonValue>>,
    pub labels: Vec<String>,
}

/// Serializes `items` into the base list plus one side channel per facet key.
pub fn split_facets(predicate: &str, items: &[Item]) -> Map<String, JsonValue> {
    let mut out = Map::new();
    out.insert(
        predicate.to_string(),
        JsonValue::Array(items.iter().map(|i| i.value.to_json()).collect()),
    );

    let keys: BTreeSet<&String> = items.iter().flat_map(|i| i.facets.keys()).collect();
    for key in keys {
        let mut channel = Map::new();
        for (index, item) in items.iter().enumerate() {
            if let Some(facet) = item.facets.get(key) {
                channel.insert(index.to_string(), facet.to_json());
            }
        }
        out.insert(side_channel_key(predicate, key), JsonValue::Object(channel));
    }
    out
}

/// Reassembles per-element mappings from the base list and its side channels.
///
/// Returns `None` when `object` has no value for `predicate`. A single
/// (non-list) value is treated as a one-element list.
pub fn fold_facets(predicate: &str, object: &Map<String, JsonValue>) -> Option<FoldedFacets> {
    let (base, single) = match object.get(predicate)? {
        JsonValue::Array(values) => (values.clone(), false),
        JsonValue::Null => return None,
        value => (vec![value.clone()], true),
    };

    // A single value carries its facets inline rather than as an index map.
    let prefix = format!("{predicate}|");
    let channels: Vec<(&str, Map<String, JsonValue>)> = object
        .iter()
        .filter_map(|(key, value)| {
            let label = key.strip_prefix(&prefix)?;
            match value {
                JsonValue::Object(map) if !single => Some((label, map.clone())),
                JsonValue::Object(_) | JsonValue::Null => None,
                inline if single => {
                    let mut map = Map::new();
                    map.insert("0".to_string(), inline.clone());
                    Some((label, map))
                }
                _ => None,
            }
        })
        .collect();

    let elements = base
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let mut element = BTreeMap::new();
            element.insert(VALUE_KEY.to_string(), value);
            let position = index.to_string();
            for (label, channel) in &channels {
                if let Some(facet) = channel.get(&position) {
                    element.insert((*label).to_string(), facet.clone());
                }
            }
            element
        })
        .collect();

    Some(FoldedFacets {
        elements,
        labels: channels.iter().map(|(label, _)| (*label).to_string()).collect(),
    })
}

/// Restores the submitted order of every sequence-tagged list in `object`.
///
/// Scalar lists carry a `pred|sequence` side channel; node lists carry the
/// facet inside each child object. Both are reordered by the facet and the
/// facet itself is dropped from the result.
pub fn restore_sequence(object: &mut Map<String, JsonValue>) {
    let suffix = format!("|{SEQUENCE_FACET}");
    let scalar_lists: Vec<String> = object
        .iter()
        .filter(|(_, v)| v.is_object())
        .filter_map(|(k, _)| k.strip_suffix(&suffix).map(str::to_string))
        .collect();

    for predicate in scalar_lists {
        let channel_key = side_channel_key(&predicate, SEQUENCE_FACET);
        let Some(JsonValue::Object(channel)) = object.remove(&channel_key) else {
            continue;
        };
        if let Some(JsonValue::Array(values)) = object.get_mut(&predicate) {
            let mut keyed: Vec<(i64, JsonValue)> = values
                .drain(..)
                .enumerate()
                .map(|(index, value)| {
                    let seq = channel
                        .get(&index.to_string())
                        .and_then(JsonValue::as_i64)
                        .unwrap_or(i64::MAX);
                    (seq, value)
                })
                .collect();
            keyed.sort_by_key(|(seq, _)| *seq);
            values.extend(keyed.into_iter().map(|(_, v)| v));
        }
    }

    for (predicate, value) in object.iter_mut() {
        let JsonValue::Array(children) = value else {
            continue;
        };
        let facet_key = format!("{predicate}{suffix}");
        let has_sequence = children
            .iter()
            .any(|c| c.as_object().is_some_and(|o| o.contains_key(&facet_key)));
        if !has_sequence {
            continue;
        }
        children.sort_by_key(|child| {
            child
                .get(&facet_key)
                .and_then(JsonValue::as_i64)
                .unwrap_or(i64::MAX)
        });
        for child in children.iter_mut() {
            if let Some(obj) = child.as_object_mut() {
                obj.remove(&facet_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn split_then_fold_audience_size() {
        let items = vec![
            Item::new(Value::Int(2020))
                .with_facet("unit", Value::string("followers"))
                .with_facet("count", Value::Int(1200)),
            Item::new(Value::Int(2021)).with_facet("unit", Value::string("subscribers")),
        ];
        let split = split_facets("audience_size", &items);
        assert_eq!(split["audience_size"], json!([2020, 2021]));
        assert_eq!(split["audience_size|count"], json!({ "0": 1200 }));

        let folded = fold_facets("audience_size", &split).unwrap();
        assert_eq!(folded.labels, vec!["count", "unit"]);
        assert_eq!(folded.elements[0]["count"], json!(1200));
        assert_eq!(folded.elements[1]["unit"], json!("subscribers"));
        assert!(!folded.elements[1].contains_key("count"));
    }

    #[test]
    fn single_value_facets_are_inline() {
        let object = json!({ "entry_added": "0x1", "entry_added|ip": "10.0.0.1" });
        let folded = fold_facets("entry_added", object.as_object().unwrap()).unwrap();
        assert_eq!(folded.elements.len(), 1);
        assert_eq!(folded.elements[0]["ip"], json!("10.0.0.1"));
    }

    #[test]
    fn missing_predicate_is_none() {
        assert!(fold_facets("audience_size", &Map::new()).is_none());
    }

    #[test]
    fn restores_scalar_and_node_sequences() {
        let mut object = json!({
            "authors": ["Roe", "Doe"],
            "authors|sequence": { "0": 1, "1": 0 },
            "creators": [
                { "uid": "0x2", "creators|sequence": 1 },
                { "uid": "0x1", "creators|sequence": 0 }
            ]
        })
        .as_object()
        .cloned()
        .unwrap();
        restore_sequence(&mut object);
        assert_eq!(object["authors"], json!(["Doe", "Roe"]));
        assert!(!object.contains_key("authors|sequence"));
        assert_eq!(object["creators"], json!([{ "uid": "0x1" }, { "uid": "0x2" }]));
    }
}
