//! N-Quad mutations.

use crate::error::StoreError;
use inventory_schema::dates;
use inventory_schema::{BlankId, Entry, Facets, NodeRef, Uid, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Value(Value),
    Node(NodeRef),
    /// Every value of the predicate (delete only).
    Star,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NQuad {
    pub subject: NodeRef,
    pub predicate: String,
    pub object: Object,
    pub facets: Facets,
}

impl NQuad {
    pub fn new(subject: NodeRef, predicate: &str, object: Object) -> Self {
        Self {
            subject,
            predicate: predicate.to_string(),
            object,
            facets: Facets::new(),
        }
    }

    pub fn value(subject: NodeRef, predicate: &str, value: Value) -> Self {
        match value {
            Value::Node(node) => Self::new(subject, predicate, Object::Node(node)),
            other => Self::new(subject, predicate, Object::Value(other)),
        }
    }

    /// `<subject> <predicate> * .`
    pub fn clear(subject: NodeRef, predicate: &str) -> Self {
        Self::new(subject, predicate, Object::Star)
    }

    pub fn with_facets(mut self, facets: Facets) -> Self {
        self.facets = facets;
        self
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", escape(s)),
        Value::Int(i) => format!("\"{i}\"^^<xs:int>"),
        Value::Float(f) => format!("\"{f}\"^^<xs:float>"),
        Value::Bool(b) => format!("\"{b}\"^^<xs:boolean>"),
        Value::DateTime(dt) => format!("\"{}\"^^<xs:dateTime>", dates::to_storage(dt)),
        Value::Geo(point) => format!("\"{}\"^^<geo:geojson>", escape(&point.to_geojson().to_string())),
        Value::Password(p) => format!("\"{}\"^^<pwd:password>", escape(p)),
        Value::Node(node) => node.to_string(),
    }
}

fn facet_literal(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::DateTime(dt) => dates::to_storage(dt),
        Value::String(s) | Value::Password(s) => format!("\"{}\"", escape(s)),
        Value::Geo(point) => format!("\"{}\"", escape(&point.to_geojson().to_string())),
        Value::Node(node) => format!("\"{node}\""),
    }
}

impl fmt::Display for NQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> ", self.subject, self.predicate)?;
        match &self.object {
            Object::Value(v) => f.write_str(&literal(v))?,
            Object::Node(node) => write!(f, "{node}")?,
            Object::Star => f.write_str("*")?,
        }
        if !self.facets.is_empty() {
            let rendered: Vec<String> = self
                .facets
                .iter()
                .map(|(k, v)| format!("{k}={}", facet_literal(v)))
                .collect();
            write!(f, " ({})", rendered.join(", "))?;
        }
        f.write_str(" .")
    }
}

/// Set quads for every stored field of `entry`; the `uid` field is the
/// subject itself and is skipped.
pub fn entry_nquads(entry: &Entry) -> Vec<NQuad> {
    let mut out = Vec::new();
    for (predicate, field) in entry.fields.iter() {
        if predicate == "uid" {
            continue;
        }
        for item in field.items() {
            out.push(
                NQuad::value(entry.node.clone(), predicate, item.value.clone())
                    .with_facets(item.facets.clone()),
            );
        }
    }
    out
}

/// One set+delete request, optionally guarded by an upsert query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    pub query: Option<String>,
    pub set: Vec<NQuad>,
    pub delete: Vec<NQuad>,
}

fn render(quads: &[NQuad]) -> String {
    quads.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nquads(&self) -> String {
        render(&self.set)
    }

    pub fn delete_nquads(&self) -> String {
        render(&self.delete)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }

    /// Body for the HTTP `/mutate` endpoint (`application/rdf`).
    pub fn to_rdf_request(&self) -> String {
        let mut body = String::new();
        if !self.delete.is_empty() {
            body.push_str(&format!("  delete {{\n{}\n  }}\n", self.delete_nquads()));
        }
        if !self.set.is_empty() {
            body.push_str(&format!("  set {{\n{}\n  }}\n", self.set_nquads()));
        }
        match &self.query {
            Some(query) => format!("upsert {{\n  query {query}\n  mutation {{\n{body}  }}\n}}"),
            None => format!("{{\n{body}}}"),
        }
    }
}

/// Uids the store assigned to blank nodes, keyed by label (no `_:`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResponse {
    pub uids: BTreeMap<String, Uid>,
}

impl MutationResponse {
    pub fn uid_for(&self, blank: &BlankId) -> Result<&Uid, StoreError> {
        self.uids
            .get(blank.label())
            .ok_or_else(|| StoreError::UnknownBlank(blank.label().to_string()))
    }

    /// Committed uid of `node`, whichever variant it is.
    pub fn resolve(&self, node: &NodeRef) -> Result<Uid, StoreError> {
        match node {
            NodeRef::Existing(uid) => Ok(uid.clone()),
            NodeRef::New(blank) => self.uid_for(blank).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use inventory_schema::{FieldValue, GeoPoint, Item};

    fn subject() -> NodeRef {
        NodeRef::New(BlankId::new("gazette").unwrap())
    }

    #[test]
    fn renders_typed_literals() {
        let s = subject();
        assert_eq!(
            NQuad::value(s.clone(), "name", Value::string("The \"Gazette\"")).to_string(),
            r#"_:gazette <name> "The \"Gazette\"" ."#
        );
        assert_eq!(
            NQuad::value(s.clone(), "employees", Value::Int(12)).to_string(),
            r#"_:gazette <employees> "12"^^<xs:int> ."#
        );
        let geo = Value::Geo(GeoPoint {
            longitude: 1.5,
            latitude: 2.0,
        });
        assert!(NQuad::value(s.clone(), "p", geo).to_string().ends_with("^^<geo:geojson> ."));
        assert_eq!(
            NQuad::clear(NodeRef::Existing(Uid::parse("0x1").unwrap()), "alternate_names").to_string(),
            "<0x1> <alternate_names> * ."
        );
    }

    #[test]
    fn renders_facets() {
        let when = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut facets = Facets::new();
        facets.insert("ip".into(), Value::string("10.0.0.1"));
        facets.insert("timestamp".into(), Value::DateTime(when));
        let quad = NQuad::value(
            subject(),
            "entry_added",
            Value::Node(NodeRef::Existing(Uid::parse("0x2").unwrap())),
        )
        .with_facets(facets);
        assert_eq!(
            quad.to_string(),
            r#"_:gazette <entry_added> <0x2> (ip="10.0.0.1", timestamp=2024-05-01T12:00:00Z) ."#
        );
    }

    #[test]
    fn entry_quads_skip_uid() {
        let mut entry = Entry::new(NodeRef::Existing(Uid::parse("0x9").unwrap()));
        entry.fields.insert(
            "uid",
            FieldValue::single(Value::Node(NodeRef::Existing(Uid::parse("0x9").unwrap()))),
        );
        entry.fields.insert(
            "languages",
            FieldValue::set(vec![Item::new(Value::string("en")), Item::new(Value::string("de"))]),
        );
        let quads = entry_nquads(&entry);
        assert_eq!(quads.len(), 2);
        assert!(quads.iter().all(|q| q.predicate == "languages"));
    }

    #[test]
    fn upsert_request_shape() {
        let mut m = Mutation::new();
        m.query = Some("{ v as var(func: uid(0x1)) }".into());
        m.delete.push(NQuad::clear(NodeRef::Existing(Uid::parse("0x1").unwrap()), "description"));
        m.set.push(NQuad::value(
            NodeRef::Existing(Uid::parse("0x1").unwrap()),
            "description",
            Value::string("new"),
        ));
        let body = m.to_rdf_request();
        assert!(body.starts_with("upsert {"));
        assert!(body.find("delete {").unwrap() < body.find("set {").unwrap());
    }
}
