//! Typed reads over the graph store.
//!
//! The reader builds projections from the registry, runs them through a
//! [`GraphClient`] and converts the raw rows into [`Document`]s: dates are
//! parsed, facet side channels folded into per-element maps and ordered
//! lists restored to submission order.
//!
//! Zero matches come back as `None`, never as an empty collection.

use crate::client::GraphClient;
use crate::error::StoreError;
use crate::query::{Edge, Filter, Func, Query, Selection};
use chrono::{DateTime, Utc};
use inventory_schema::facets::{fold_facets, restore_sequence, VALUE_KEY};
use inventory_schema::predicate::{parse_geo, PredicateKind};
use inventory_schema::schema::TYPE_PREDICATE;
use inventory_schema::{
    auxiliary, catalog, dates, EntityType, FacetType, GeoPoint, Predicate, Registry, Role, Uid,
};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};

/// A decoded value in a read result.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    Geo(GeoPoint),
    List(Vec<Field>),
    Node(Document),
    /// One map per element: the value under `"value"` plus its facets.
    Faceted(Vec<BTreeMap<String, Field>>),
}

impl Field {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Field::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Field::Date(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Document> {
        match self {
            Field::Node(doc) => Some(doc),
            _ => None,
        }
    }

    /// Elements of a list, or the value itself as a one-element slice.
    pub fn elements(&self) -> &[Field] {
        match self {
            Field::List(items) => items,
            Field::Null => &[],
            other => std::slice::from_ref(other),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Field::Null => JsonValue::Null,
            Field::Bool(b) => json!(b),
            Field::Int(i) => json!(i),
            Field::Float(f) => json!(f),
            Field::Text(s) => json!(s),
            Field::Date(dt) => json!(dates::to_storage(dt)),
            Field::Geo(point) => point.to_geojson(),
            Field::List(items) => JsonValue::Array(items.iter().map(Field::to_json).collect()),
            Field::Node(doc) => doc.to_json(),
            Field::Faceted(elements) => JsonValue::Array(
                elements
                    .iter()
                    .map(|e| {
                        JsonValue::Object(e.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
                    })
                    .collect(),
            ),
        }
    }
}

/// One node of a read result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub fields: BTreeMap<String, Field>,
    /// Facets of the edge this node was reached through.
    pub facets: BTreeMap<String, Field>,
}

impl Document {
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Field::as_str)
    }

    pub fn uid(&self) -> Option<Uid> {
        self.text("uid").and_then(|s| Uid::parse(s).ok())
    }

    pub fn types(&self) -> Vec<&str> {
        self.get(TYPE_PREDICATE)
            .map(|f| f.elements().iter().filter_map(Field::as_str).collect())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> JsonValue {
        let mut out: Map<String, JsonValue> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        if !self.facets.is_empty() {
            let facets = self.facets.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
            out.insert("@facets".to_string(), JsonValue::Object(facets));
        }
        JsonValue::Object(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySelector {
    UniqueName(String),
    Uid(Uid),
}

/// Which predicates a listing returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    /// Identity plus queryable predicates.
    #[default]
    Default,
    /// Every predicate of the type.
    All,
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub type_name: String,
    pub filter: Option<Filter>,
    /// Keep only nodes with a `predicate` edge to a node matching the filter.
    pub relations: Vec<(String, Filter)>,
    pub projection: Projection,
    pub first: Option<usize>,
    pub offset: Option<usize>,
}

impl ListRequest {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            filter: None,
            relations: Vec::new(),
            projection: Projection::Default,
            first: None,
            offset: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn related(mut self, predicate: &str, filter: Filter) -> Self {
        self.relations.push((predicate.to_string(), filter));
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn page(mut self, first: usize, offset: usize) -> Self {
        self.first = Some(first);
        self.offset = Some(offset);
        self
    }
}

/// What the sanitizer needs to know about an edit target.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCheck {
    pub uid: Uid,
    pub unique_name: Option<String>,
    pub types: Vec<String>,
    pub review_status: Option<String>,
    pub added_by: Option<Uid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub uid: Uid,
    pub display_name: Option<String>,
    pub role: Role,
}

const CHILD_FIELDS: &[&str] = &["uid", "unique_name", "name", "display_name", TYPE_PREDICATE];

fn child_selection() -> Vec<Selection> {
    Selection::fields(CHILD_FIELDS)
}

fn type_filter(types: &[String]) -> Option<Filter> {
    match types {
        [] => None,
        [only] => Some(Filter::of_type(only)),
        many => Some(Filter::Or(many.iter().map(|t| Filter::of_type(t)).collect())),
    }
}

fn projection_for(p: &Predicate) -> Option<Selection> {
    if !p.stored {
        return None;
    }
    match &p.kind {
        PredicateKind::Uid => Some(Selection::field("uid")),
        PredicateKind::Password => None,
        PredicateKind::ReverseRelationship { predicate, target } => {
            let mut edge = Edge::new(predicate, child_selection()).reverse().alias(&p.name);
            if let inventory_schema::TargetConstraint::Types(types) = target {
                if let Some(filter) = type_filter(types) {
                    edge = edge.filter(filter);
                }
            }
            Some(Selection::Edge(edge))
        }
        PredicateKind::Relationship { .. } => {
            let mut edge = Edge::new(&p.name, child_selection());
            if !p.facets.is_empty() {
                edge = edge.with_facets();
            }
            Some(Selection::Edge(edge))
        }
        PredicateKind::ListString { ordered: true, .. } => Some(Selection::faceted(&p.name)),
        _ if !p.facets.is_empty() => Some(Selection::faceted(&p.name)),
        _ => Some(Selection::field(&p.name)),
    }
}

/// Reverse counts shown on hub types.
fn type_counts(type_name: &str) -> Vec<Selection> {
    let sources = || Some(Filter::of_type("Source"));
    let count = |predicate: &str, reverse: bool, filter: Option<Filter>| Selection::Count {
        alias: "num_sources".to_string(),
        predicate: predicate.to_string(),
        reverse,
        filter,
    };
    match type_name {
        "Channel" => vec![count("channel", true, sources())],
        "Country" | "Multinational" => vec![count("country", true, sources())],
        "Subnational" => vec![count("geographic_scope_subunit", true, sources())],
        "Archive" | "Dataset" => vec![count("sources_included", false, None)],
        _ => Vec::new(),
    }
}

fn typed_projection(entity: &EntityType) -> Vec<Selection> {
    let mut selections: Vec<Selection> = entity.predicates.iter().filter_map(projection_for).collect();
    if !selections.iter().any(|s| matches!(s, Selection::Field { predicate, .. } if predicate == "uid")) {
        selections.insert(0, Selection::field("uid"));
    }
    selections.push(Selection::field(TYPE_PREDICATE));
    selections.extend(type_counts(&entity.name));
    selections
}

fn uid_value(row: &JsonValue) -> Option<Uid> {
    row.get("uid").and_then(JsonValue::as_str).and_then(|s| Uid::parse(s).ok())
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(JsonValue::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

pub struct Reader<'a> {
    client: &'a GraphClient,
    registry: &'a Registry,
}

impl<'a> Reader<'a> {
    pub fn new(client: &'a GraphClient, registry: &'a Registry) -> Self {
        Self { client, registry }
    }

    /// Full entry by unique name or uid, projected for its most specific
    /// registered type (or `type_hint` when given).
    pub fn get_entry(
        &self,
        selector: &EntrySelector,
        type_hint: Option<&str>,
    ) -> Result<Option<Document>, StoreError> {
        let func = match selector {
            EntrySelector::UniqueName(name) => Func::Eq {
                predicate: "unique_name".to_string(),
                value: json!(name.trim().to_lowercase()),
            },
            EntrySelector::Uid(uid) => Func::Uid(vec![uid.clone()]),
        };
        let lookup = Query::new("lookup", func)
            .first(1)
            .select_all(Selection::fields(&["uid", TYPE_PREDICATE]));
        let rows = self.client.query_block(&lookup)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let Some(uid) = uid_value(row) else {
            return Ok(None);
        };
        let types = string_list(row.get(TYPE_PREDICATE));

        let entity = match type_hint {
            Some(hint) => Some(
                self.registry
                    .resolve_type(hint)
                    .ok_or_else(|| inventory_schema::SchemaError::UnknownType(hint.to_string()))?,
            ),
            None => self.most_specific(&types),
        };
        let selections = match entity {
            Some(entity) => typed_projection(entity),
            None => vec![
                Selection::field("uid"),
                Selection::field(TYPE_PREDICATE),
                Selection::ExpandAll {
                    children: child_selection(),
                },
            ],
        };
        let query = Query::new("entry", Func::Uid(vec![uid])).select_all(selections);
        let rows = self.client.query_block(&query)?;
        Ok(rows.into_iter().next().map(|row| self.document(row)))
    }

    fn most_specific(&self, types: &[String]) -> Option<&'a EntityType> {
        types
            .iter()
            .filter_map(|t| self.registry.get_type(t).ok())
            .max_by_key(|t| t.lineage.len())
    }

    /// Nodes of one type, ordered by name.
    pub fn list_by_type(&self, request: &ListRequest) -> Result<Option<Vec<Document>>, StoreError> {
        let entity = self.registry.get_type(&request.type_name)?;

        let mut filters: Vec<Filter> = request.filter.iter().cloned().collect();
        if !request.relations.is_empty() {
            let related = self.related_uids(&entity.name, &request.relations)?;
            if related.is_empty() {
                return Ok(None);
            }
            filters.push(Filter::Uid(related));
        }

        let selections = match &request.projection {
            Projection::All => typed_projection(entity),
            Projection::Default => {
                let mut out = Selection::fields(&["uid", "unique_name", "name", TYPE_PREDICATE]);
                out.extend(
                    entity
                        .predicates
                        .iter()
                        .filter(|p| p.queryable && !matches!(p.name.as_str(), "unique_name" | "name"))
                        .filter_map(projection_for),
                );
                out
            }
            Projection::Fields(names) => {
                let mut out = vec![Selection::field("uid")];
                for name in names {
                    let p = entity.predicate(name).ok_or_else(|| {
                        StoreError::InvalidQuery(format!("`{name}` is not a predicate of {}", entity.name))
                    })?;
                    out.extend(projection_for(p));
                }
                out
            }
        };

        let mut query = Query::new("list", Func::Type(entity.name.clone()))
            .order_asc("name")
            .select_all(selections);
        query.filter = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        };
        query.first = request.first;
        query.offset = request.offset;

        let rows = self.client.query_block(&query)?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().map(|row| self.document(row)).collect()))
    }

    fn related_uids(&self, type_name: &str, relations: &[(String, Filter)]) -> Result<Vec<Uid>, StoreError> {
        let mut query = Query::new("related", Func::Type(type_name.to_string()))
            .cascade()
            .select(Selection::field("uid"));
        for (i, (predicate, filter)) in relations.iter().enumerate() {
            query = query.select(Selection::Edge(
                Edge::new(predicate, Selection::fields(&["uid"]))
                    .alias(&format!("rel{i}"))
                    .filter(filter.clone()),
            ));
        }
        Ok(self
            .client
            .query_block(&query)?
            .iter()
            .filter_map(uid_value)
            .collect())
    }

    /// Uid of the first node whose `predicate` equals `value`.
    pub fn get_uid(&self, predicate: &str, value: &str) -> Result<Option<Uid>, StoreError> {
        let query = Query::new(
            "q",
            Func::Eq {
                predicate: predicate.to_string(),
                value: json!(value),
            },
        )
        .first(1)
        .select(Selection::field("uid"));
        Ok(self.client.query_block(&query)?.first().and_then(uid_value))
    }

    pub fn check_entry(&self, uid: &Uid) -> Result<Option<EntryCheck>, StoreError> {
        let query = Query::new("check", Func::Uid(vec![uid.clone()]))
            .select_all(Selection::fields(&[
                "uid",
                "unique_name",
                TYPE_PREDICATE,
                catalog::REVIEW_STATUS,
            ]))
            .select(Selection::Edge(Edge::new(
                catalog::ENTRY_ADDED,
                Selection::fields(&["uid"]),
            )));
        let rows = self.client.query_block(&query)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let added_by = match row.get(catalog::ENTRY_ADDED) {
            Some(JsonValue::Array(items)) => items.first().and_then(uid_value),
            Some(other) => uid_value(other),
            None => None,
        };
        Ok(Some(EntryCheck {
            uid: uid_value(row).unwrap_or_else(|| uid.clone()),
            unique_name: row.get("unique_name").and_then(JsonValue::as_str).map(str::to_string),
            types: string_list(row.get(TYPE_PREDICATE)),
            review_status: row
                .get(catalog::REVIEW_STATUS)
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            added_by,
        }))
    }

    /// Type tags of each existing node in `uids`; missing nodes are absent.
    pub fn node_types(&self, uids: &[Uid]) -> Result<BTreeMap<Uid, Vec<String>>, StoreError> {
        if uids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let query = Query::new("types", Func::Uid(uids.to_vec()))
            .select_all(Selection::fields(&["uid", TYPE_PREDICATE]));
        Ok(self
            .client
            .query_block(&query)?
            .iter()
            .filter_map(|row| Some((uid_value(row)?, string_list(row.get(TYPE_PREDICATE)))))
            .filter(|(_, types)| !types.is_empty())
            .collect())
    }

    pub fn get_rejected(&self, uid: &Uid) -> Result<Option<Document>, StoreError> {
        let entity = self.registry.get_type(catalog::REJECTED_TYPE)?;
        let query = Query::new("rejected", Func::Uid(vec![uid.clone()]))
            .filter(Filter::of_type(catalog::REJECTED_TYPE))
            .select_all(typed_projection(entity));
        let rows = self.client.query_block(&query)?;
        Ok(rows.into_iter().next().map(|row| self.document(row)))
    }

    pub fn get_user(&self, uid: &Uid) -> Result<Option<UserRecord>, StoreError> {
        let query = Query::new("user", Func::Uid(vec![uid.clone()]))
            .filter(Filter::of_type(catalog::USER_TYPE))
            .select_all(Selection::fields(&["uid", "display_name", "role"]));
        let rows = self.client.query_block(&query)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(Some(UserRecord {
            uid: uid_value(row).unwrap_or_else(|| uid.clone()),
            display_name: row.get("display_name").and_then(JsonValue::as_str).map(str::to_string),
            role: Role::from_level(row.get("role").and_then(JsonValue::as_i64).unwrap_or(0)),
        }))
    }

    /// Converts one raw result row.
    pub fn document(&self, row: JsonValue) -> Document {
        let date_keys = self.registry.date_predicates();
        match row {
            JsonValue::Object(map) => self.convert_object(map, &date_keys),
            _ => Document::default(),
        }
    }

    fn convert_object(&self, mut map: Map<String, JsonValue>, date_keys: &BTreeSet<&str>) -> Document {
        restore_sequence(&mut map);
        let mut doc = Document::default();
        let faceted: BTreeSet<String> = map
            .keys()
            .filter_map(|k| k.split_once('|').map(|(p, _)| p.to_string()))
            .filter(|p| map.contains_key(p))
            .collect();

        for (key, value) in &map {
            if let Some((predicate, facet)) = key.split_once('|') {
                if !map.contains_key(predicate) {
                    // Facet of the edge that led to this node.
                    let field = self.convert_facet(predicate.trim_start_matches('~'), facet, value.clone());
                    doc.facets.insert(facet.to_string(), field);
                }
                continue;
            }
            if self.is_password(key) {
                continue;
            }
            let field = if faceted.contains(key) {
                self.fold(key, &map, date_keys)
            } else {
                self.convert_value(key, value.clone(), date_keys)
            };
            doc.fields.insert(key.clone(), field);
        }
        self.add_conveniences(&mut doc);
        doc
    }

    fn fold(&self, predicate: &str, map: &Map<String, JsonValue>, date_keys: &BTreeSet<&str>) -> Field {
        let Some(folded) = fold_facets(predicate, map) else {
            return Field::Null;
        };
        Field::Faceted(
            folded
                .elements
                .into_iter()
                .map(|element| {
                    element
                        .into_iter()
                        .map(|(label, raw)| {
                            let field = if label == VALUE_KEY {
                                self.convert_value(predicate, raw, date_keys)
                            } else {
                                self.convert_facet(predicate, &label, raw)
                            };
                            (label, field)
                        })
                        .collect()
                })
                .collect(),
        )
    }

    fn convert_facet(&self, predicate: &str, facet: &str, raw: JsonValue) -> Field {
        let is_date = self
            .registry
            .predicate(predicate)
            .and_then(|p| p.facets.iter().find(|f| f.key == facet))
            .is_some_and(|f| f.dtype == FacetType::DateTime);
        match raw {
            JsonValue::String(s) if is_date => dates::parse_permissive(&s).map_or(Field::Text(s), Field::Date),
            other => plain(other),
        }
    }

    fn convert_value(&self, key: &str, raw: JsonValue, date_keys: &BTreeSet<&str>) -> Field {
        match raw {
            JsonValue::Array(items) => {
                Field::List(items.into_iter().map(|v| self.convert_value(key, v, date_keys)).collect())
            }
            JsonValue::String(s) if date_keys.contains(key) => {
                dates::parse_permissive(&s).map_or(Field::Text(s), Field::Date)
            }
            JsonValue::Object(map) => {
                let raw = JsonValue::Object(map);
                if raw.get("coordinates").is_some() {
                    if let Some(point) = parse_geo(&raw) {
                        return Field::Geo(point);
                    }
                }
                match raw {
                    JsonValue::Object(map) => Field::Node(self.convert_object(map, date_keys)),
                    other => plain(other),
                }
            }
            other => plain(other),
        }
    }

    fn is_password(&self, key: &str) -> bool {
        self.registry
            .predicate(key)
            .is_some_and(|p| matches!(p.kind, PredicateKind::Password))
    }

    fn add_conveniences(&self, doc: &mut Document) {
        let mut extra = Vec::new();
        for (key, field) in &doc.fields {
            let Some(p) = self.registry.predicate(key) else {
                continue;
            };
            if p.large_textfield {
                if let Some(text) = field.as_str() {
                    let paragraphs = text
                        .split('\n')
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(|line| Field::Text(line.to_string()))
                        .collect();
                    extra.push((format!("{key}_paragraphs"), Field::List(paragraphs)));
                }
            }
            if is_language_choice(p) {
                let names: Vec<Field> = field
                    .elements()
                    .iter()
                    .filter_map(Field::as_str)
                    .map(|code| Field::Text(auxiliary::language_name(code).unwrap_or(code).to_string()))
                    .collect();
                extra.push((format!("{key}_pretty"), Field::List(names)));
            }
        }
        doc.fields.extend(extra);
    }
}

fn is_language_choice(p: &Predicate) -> bool {
    match &p.kind {
        PredicateKind::SingleChoice { choices, .. } | PredicateKind::MultipleChoice { choices, .. } => {
            !choices.is_empty() && choices.keys().all(|k| auxiliary::language_name(k).is_some())
        }
        _ => false,
    }
}

fn plain(raw: JsonValue) -> Field {
    match raw {
        JsonValue::Null => Field::Null,
        JsonValue::Bool(b) => Field::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Field::Int(i),
            None => Field::Float(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => Field::Text(s),
        JsonValue::Array(items) => Field::List(items.into_iter().map(plain).collect()),
        JsonValue::Object(map) => Field::Node(Document {
            fields: map.into_iter().map(|(k, v)| (k, plain(v))).collect(),
            facets: BTreeMap::new(),
        }),
    }
}
