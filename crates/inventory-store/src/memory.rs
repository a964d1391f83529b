//! In-process graph store.
//!
//! Evaluates [`Query`] values directly against a node map and applies
//! mutations atomically (clone, apply, swap). It counts every query and
//! mutation it serves so callers can assert that a code path never touched
//! storage.

use crate::client::GraphBackend;
use crate::error::StoreError;
use crate::mutation::{Mutation, MutationResponse, NQuad, Object};
use crate::query::{CompareOp, Edge, Filter, Func, Query, Selection};
use inventory_schema::facets::side_channel_key;
use inventory_schema::schema::TYPE_PREDICATE;
use inventory_schema::{Facets, Item, NodeRef, Uid, Value};
use parking_lot::RwLock;
use serde_json::{json, Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

type Node = BTreeMap<String, Vec<Item>>;

#[derive(Debug, Clone, Default)]
struct State {
    nodes: BTreeMap<u64, Node>,
    next_uid: u64,
    lists: BTreeSet<String>,
}

impl State {
    fn is_list(&self, predicate: &str) -> bool {
        predicate == TYPE_PREDICATE || self.lists.contains(predicate)
    }

    fn allocate(&mut self) -> u64 {
        self.next_uid += 1;
        while self.nodes.contains_key(&self.next_uid) {
            self.next_uid += 1;
        }
        self.next_uid
    }
}

#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries served since creation.
    pub fn reads(&self) -> usize {
        self.reads.load(AtomicOrdering::Relaxed)
    }

    /// Mutations applied since creation (seeding excluded).
    pub fn writes(&self) -> usize {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Applies `mutation` without touching the counters.
    pub fn seed(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        self.apply(mutation)
    }

    /// Every value of `predicate` on `uid`, in storage order.
    pub fn values(&self, uid: &Uid, predicate: &str) -> Vec<Value> {
        let Some(key) = uid.to_u64() else {
            return Vec::new();
        };
        self.state
            .read()
            .nodes
            .get(&key)
            .and_then(|node| node.get(predicate))
            .map(|items| items.iter().map(|i| i.value.clone()).collect())
            .unwrap_or_default()
    }

    fn apply(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        if mutation.query.is_some() {
            tracing::debug!("upsert guard query is not evaluated in memory");
        }
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let mut blanks: BTreeMap<String, u64> = BTreeMap::new();

        for quad in &mutation.delete {
            apply_delete(&mut next, quad, &blanks)?;
        }
        for quad in &mutation.set {
            apply_set(&mut next, quad, &mut blanks)?;
        }

        *guard = next;
        Ok(MutationResponse {
            uids: blanks
                .into_iter()
                .map(|(label, n)| (label, Uid::from_u64(n)))
                .collect(),
        })
    }
}

fn resolve(
    state: &mut State,
    node: &NodeRef,
    blanks: &mut BTreeMap<String, u64>,
) -> Result<u64, StoreError> {
    match node {
        NodeRef::Existing(uid) => uid
            .to_u64()
            .ok_or_else(|| StoreError::Rejected(format!("uid {uid} out of range"))),
        NodeRef::New(blank) => {
            if let Some(n) = blanks.get(blank.label()) {
                return Ok(*n);
            }
            let n = state.allocate();
            blanks.insert(blank.label().to_string(), n);
            Ok(n)
        }
    }
}

fn lookup(node: &NodeRef, blanks: &BTreeMap<String, u64>) -> Result<u64, StoreError> {
    match node {
        NodeRef::Existing(uid) => uid
            .to_u64()
            .ok_or_else(|| StoreError::Rejected(format!("uid {uid} out of range"))),
        NodeRef::New(blank) => blanks
            .get(blank.label())
            .copied()
            .ok_or_else(|| StoreError::UnknownBlank(blank.label().to_string())),
    }
}

fn apply_delete(state: &mut State, quad: &NQuad, blanks: &BTreeMap<String, u64>) -> Result<(), StoreError> {
    let subject = lookup(&quad.subject, blanks)?;
    let target = match &quad.object {
        Object::Star => None,
        Object::Node(node) => Some(Value::Node(NodeRef::Existing(Uid::from_u64(lookup(node, blanks)?)))),
        Object::Value(value) => Some(value.clone()),
    };
    let Some(node) = state.nodes.get_mut(&subject) else {
        return Ok(());
    };
    match target {
        None => {
            node.remove(&quad.predicate);
        }
        Some(value) => {
            if let Some(items) = node.get_mut(&quad.predicate) {
                items.retain(|item| item.value != value);
                if items.is_empty() {
                    node.remove(&quad.predicate);
                }
            }
        }
    }
    if node.is_empty() {
        state.nodes.remove(&subject);
    }
    Ok(())
}

fn apply_set(
    state: &mut State,
    quad: &NQuad,
    blanks: &mut BTreeMap<String, u64>,
) -> Result<(), StoreError> {
    let subject = resolve(state, &quad.subject, blanks)?;
    let value = match &quad.object {
        Object::Star => {
            return Err(StoreError::Rejected(format!(
                "`*` is only valid in deletes ({})",
                quad.predicate
            )))
        }
        Object::Node(node) => {
            let target = resolve(state, node, blanks)?;
            Value::Node(NodeRef::Existing(Uid::from_u64(target)))
        }
        Object::Value(Value::Node(node)) => {
            let target = resolve(state, node, blanks)?;
            Value::Node(NodeRef::Existing(Uid::from_u64(target)))
        }
        Object::Value(value) => value.clone(),
    };
    let item = Item {
        value,
        facets: quad.facets.clone(),
    };
    let list = state.is_list(&quad.predicate);
    let items = state
        .nodes
        .entry(subject)
        .or_default()
        .entry(quad.predicate.clone())
        .or_default();
    if !list {
        items.clear();
        items.push(item);
    } else if let Some(existing) = items.iter_mut().find(|i| i.value == item.value) {
        existing.facets = item.facets;
    } else {
        items.push(item);
    }
    Ok(())
}

/// Predicate names declared as lists (`name: [type] ...`) in a storage schema.
fn list_predicates(schema: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut in_type = false;
    for line in schema.lines().map(str::trim) {
        if line.starts_with("type ") {
            in_type = !line.ends_with('}');
            continue;
        }
        if in_type {
            if line == "}" {
                in_type = false;
            }
            continue;
        }
        if let Some((name, rest)) = line.split_once(':') {
            if rest.trim_start().starts_with('[') {
                out.insert(name.trim().trim_matches(|c| c == '<' || c == '>').to_string());
            }
        }
    }
    out
}

impl GraphBackend for MemoryGraph {
    fn query(&self, query: &Query) -> Result<JsonValue, StoreError> {
        self.reads.fetch_add(1, AtomicOrdering::Relaxed);
        let state = self.state.read();
        let eval = Eval { state: &state };
        let rows = eval.run(query)?;
        let mut out = Map::new();
        out.insert(query.block.clone(), JsonValue::Array(rows));
        Ok(JsonValue::Object(out))
    }

    fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        self.apply(mutation)
    }

    fn alter(&self, schema: &str) -> Result<(), StoreError> {
        let lists = list_predicates(schema);
        tracing::debug!(lists = lists.len(), "schema installed");
        self.state.write().lists.extend(lists);
        Ok(())
    }
}

struct Eval<'s> {
    state: &'s State,
}

fn uid_of(value: &Value) -> Option<u64> {
    match value {
        Value::Node(NodeRef::Existing(uid)) => uid.to_u64(),
        _ => None,
    }
}

fn hex(n: u64) -> JsonValue {
    JsonValue::String(Uid::from_u64(n).to_string())
}

fn json_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Orders a stored value against a query literal.
fn compare_json(value: &Value, literal: &JsonValue) -> Option<Ordering> {
    match value {
        Value::Int(i) => json_number(literal).and_then(|n| (*i as f64).partial_cmp(&n)),
        Value::Float(f) => json_number(literal).and_then(|n| f.partial_cmp(&n)),
        Value::Bool(b) => literal.as_bool().map(|l| b.cmp(&l)),
        Value::String(s) => literal.as_str().map(|l| s.as_str().cmp(l)),
        Value::DateTime(dt) => {
            let text = literal.as_str()?;
            match inventory_schema::dates::parse_permissive(text) {
                Some(other) => Some(dt.cmp(&other)),
                None => Some(inventory_schema::dates::to_storage(dt).as_str().cmp(text)),
            }
        }
        Value::Node(NodeRef::Existing(uid)) => {
            let other = Uid::parse(literal.as_str()?).ok()?;
            Some(uid.cmp(&other))
        }
        Value::Node(NodeRef::New(_)) | Value::Geo(_) | Value::Password(_) => None,
    }
}

fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl<'s> Eval<'s> {
    fn node(&self, uid: u64) -> Option<&'s Node> {
        self.state.nodes.get(&uid)
    }

    fn items(&self, uid: u64, predicate: &str) -> &'s [Item] {
        self.node(uid)
            .and_then(|n| n.get(predicate))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes with an edge `predicate` pointing at `uid`, with that edge's facets.
    fn sources(&self, uid: u64, predicate: &str) -> Vec<(u64, &'s Facets)> {
        let mut out = Vec::new();
        for (source, node) in &self.state.nodes {
            if let Some(items) = node.get(predicate) {
                for item in items {
                    if uid_of(&item.value) == Some(uid) {
                        out.push((*source, &item.facets));
                    }
                }
            }
        }
        out
    }

    fn targets(&self, uid: u64, predicate: &str) -> Vec<(u64, &'s Facets)> {
        self.items(uid, predicate)
            .iter()
            .filter_map(|item| uid_of(&item.value).map(|t| (t, &item.facets)))
            .filter(|(t, _)| self.state.nodes.contains_key(t))
            .collect()
    }

    fn has_type(&self, uid: u64, type_name: &str) -> bool {
        self.items(uid, TYPE_PREDICATE)
            .iter()
            .any(|i| i.value.as_str() == Some(type_name))
    }

    fn has(&self, uid: u64, predicate: &str) -> bool {
        match predicate.strip_prefix('~') {
            Some(forward) => !self.sources(uid, forward).is_empty(),
            None => !self.items(uid, predicate).is_empty(),
        }
    }

    fn matches(&self, uid: u64, filter: &Filter) -> bool {
        match filter {
            Filter::Compare { op, predicate, value } => {
                if predicate == "uid" {
                    let own = Value::Node(NodeRef::Existing(Uid::from_u64(uid)));
                    return compare_json(&own, value) == Some(Ordering::Equal) && *op == CompareOp::Eq;
                }
                self.items(uid, predicate).iter().any(|item| {
                    let Some(ord) = compare_json(&item.value, value) else {
                        return false;
                    };
                    match op {
                        CompareOp::Eq => ord == Ordering::Equal,
                        CompareOp::Ge => ord != Ordering::Less,
                        CompareOp::Le => ord != Ordering::Greater,
                        CompareOp::Gt => ord == Ordering::Greater,
                        CompareOp::Lt => ord == Ordering::Less,
                    }
                })
            }
            Filter::Type(t) => self.has_type(uid, t),
            Filter::Has(p) => self.has(uid, p),
            Filter::AnyOfTerms { predicate, terms } => {
                let wanted: Vec<String> = terms.split_whitespace().map(str::to_lowercase).collect();
                self.items(uid, predicate).iter().any(|item| {
                    item.value.as_str().is_some_and(|text| {
                        let text = text.to_lowercase();
                        text.split(|c: char| !c.is_alphanumeric())
                            .any(|word| wanted.iter().any(|w| w == word))
                    })
                })
            }
            Filter::Uid(uids) => uids.iter().any(|u| u.to_u64() == Some(uid)),
            Filter::And(parts) => parts.iter().all(|f| self.matches(uid, f)),
            Filter::Or(parts) => parts.iter().any(|f| self.matches(uid, f)),
            Filter::Not(inner) => !self.matches(uid, inner),
        }
    }

    fn roots(&self, func: &Func) -> Vec<u64> {
        let all = self.state.nodes.keys().copied();
        match func {
            Func::Uid(uids) => {
                let mut seen = BTreeSet::new();
                uids.iter()
                    .filter_map(Uid::to_u64)
                    .filter(|n| self.state.nodes.contains_key(n) && seen.insert(*n))
                    .collect()
            }
            Func::Eq { predicate, value } => all
                .filter(|n| self.matches(*n, &Filter::eq(predicate, value.clone())))
                .collect(),
            Func::Type(t) => all.filter(|n| self.has_type(*n, t)).collect(),
            Func::Has(p) => all.filter(|n| self.has(*n, p)).collect(),
        }
    }

    fn run(&self, query: &Query) -> Result<Vec<JsonValue>, StoreError> {
        let mut uids = self.roots(&query.func);
        if let Some(filter) = &query.filter {
            uids.retain(|n| self.matches(*n, filter));
        }
        if let Some(order) = &query.order_asc {
            uids.sort_by(|a, b| {
                let va = self.items(*a, order).first().map(|i| &i.value);
                let vb = self.items(*b, order).first().map(|i| &i.value);
                match (va, vb) {
                    (Some(x), Some(y)) => value_cmp(x, y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
        let offset = query.offset.unwrap_or(0);
        let first = query.first.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for uid in uids.into_iter().skip(offset).take(first) {
            let row = self.render(uid, &query.selections);
            if query.cascade && !self.complete(&row, &query.selections) {
                continue;
            }
            rows.push(JsonValue::Object(row));
        }
        Ok(rows)
    }

    /// `@cascade`: every selected key must be present.
    fn complete(&self, row: &Map<String, JsonValue>, selections: &[Selection]) -> bool {
        selections.iter().all(|s| match s {
            Selection::Field { predicate, alias, .. } => {
                row.contains_key(alias.as_deref().unwrap_or(predicate))
            }
            Selection::Edge(edge) => row.contains_key(&edge.key()),
            Selection::ExpandAll { .. } | Selection::Count { .. } => true,
        })
    }

    fn render(&self, uid: u64, selections: &[Selection]) -> Map<String, JsonValue> {
        let mut out = Map::new();
        for selection in selections {
            match selection {
                Selection::Field { predicate, alias, facets } => {
                    let key = alias.clone().unwrap_or_else(|| predicate.clone());
                    self.render_field(uid, predicate, &key, *facets, &mut out);
                }
                Selection::Edge(edge) => self.render_edge(uid, edge, &mut out),
                Selection::ExpandAll { children } => {
                    let Some(node) = self.node(uid) else { continue };
                    for (predicate, items) in node {
                        if predicate == TYPE_PREDICATE || out.contains_key(predicate) {
                            continue;
                        }
                        let is_edge = items.iter().any(|i| uid_of(&i.value).is_some());
                        if !is_edge {
                            self.render_field(uid, predicate, predicate, false, &mut out);
                        } else if !children.is_empty() {
                            let edge = Edge::new(predicate, children.clone());
                            self.render_edge(uid, &edge, &mut out);
                        }
                    }
                }
                Selection::Count { alias, predicate, reverse, filter } => {
                    let keep = |t: &u64| filter.as_ref().map_or(true, |f| self.matches(*t, f));
                    let items = self.items(uid, predicate);
                    let n = if *reverse {
                        self.sources(uid, predicate).iter().map(|(t, _)| *t).filter(keep).count()
                    } else if items.iter().any(|i| uid_of(&i.value).is_some()) {
                        self.targets(uid, predicate).iter().map(|(t, _)| *t).filter(keep).count()
                    } else {
                        items.len()
                    };
                    out.insert(alias.clone(), json!(n));
                }
            }
        }
        out
    }

    fn render_field(&self, uid: u64, predicate: &str, key: &str, facets: bool, out: &mut Map<String, JsonValue>) {
        if predicate == "uid" {
            out.insert(key.to_string(), hex(uid));
            return;
        }
        let items: Vec<&Item> = self
            .items(uid, predicate)
            .iter()
            .filter(|i| !matches!(i.value, Value::Password(_)))
            .collect();
        if items.is_empty() {
            return;
        }
        let list = self.state.is_list(predicate);
        let values: Vec<JsonValue> = items.iter().map(|i| i.value.to_json()).collect();
        if list {
            out.insert(key.to_string(), JsonValue::Array(values));
        } else if let Some(first) = values.into_iter().next() {
            out.insert(key.to_string(), first);
        }
        if !facets {
            return;
        }
        let labels: BTreeSet<&String> = items.iter().flat_map(|i| i.facets.keys()).collect();
        for label in labels {
            let channel_key = side_channel_key(key, label);
            if list {
                let mut channel = Map::new();
                for (index, item) in items.iter().enumerate() {
                    if let Some(facet) = item.facets.get(label) {
                        channel.insert(index.to_string(), facet.to_json());
                    }
                }
                out.insert(channel_key, JsonValue::Object(channel));
            } else if let Some(facet) = items[0].facets.get(label) {
                out.insert(channel_key, facet.to_json());
            }
        }
    }

    fn render_edge(&self, uid: u64, edge: &Edge, out: &mut Map<String, JsonValue>) {
        let linked = if edge.reverse {
            self.sources(uid, &edge.predicate)
        } else {
            self.targets(uid, &edge.predicate)
        };
        let facet_prefix = if edge.reverse {
            format!("~{}", edge.predicate)
        } else {
            edge.predicate.clone()
        };
        let mut children = Vec::new();
        for (target, facets) in linked {
            if let Some(filter) = &edge.filter {
                if !self.matches(target, filter) {
                    continue;
                }
            }
            let mut child = self.render(target, &edge.children);
            if edge.facets {
                for (label, value) in facets {
                    child.insert(side_channel_key(&facet_prefix, label), value.to_json());
                }
            }
            if !child.is_empty() {
                children.push(JsonValue::Object(child));
            }
        }
        if children.is_empty() {
            return;
        }
        let single = !edge.reverse && !self.state.is_list(&edge.predicate);
        let value = if single {
            children.swap_remove(0)
        } else {
            JsonValue::Array(children)
        };
        out.insert(edge.key(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_schema::BlankId;

    fn blank(label: &str) -> NodeRef {
        NodeRef::New(BlankId::new(label).unwrap())
    }

    fn graph() -> (MemoryGraph, Uid, Uid) {
        let g = MemoryGraph::new();
        g.alter("languages: [string] .\nsources_included: [uid] @reverse .\ntype Source {\n  languages\n}")
            .unwrap();
        let mut m = Mutation::new();
        m.set.push(NQuad::value(blank("s"), TYPE_PREDICATE, Value::string("Source")));
        m.set.push(NQuad::value(blank("s"), "name", Value::string("Gazette")));
        m.set.push(NQuad::value(blank("s"), "languages", Value::string("en")));
        m.set.push(NQuad::value(blank("s"), "languages", Value::string("de")));
        m.set.push(NQuad::value(blank("d"), TYPE_PREDICATE, Value::string("Dataset")));
        m.set.push(NQuad::value(blank("d"), "name", Value::string("Corpus")));
        m.set.push(
            NQuad::value(blank("d"), "sources_included", Value::Node(blank("s")))
                .with_facets(Facets::from([("note".to_string(), Value::string("all"))])),
        );
        let resp = g.seed(&m).unwrap();
        let s = resp.uid_for(&BlankId::new("s").unwrap()).unwrap().clone();
        let d = resp.uid_for(&BlankId::new("d").unwrap()).unwrap().clone();
        (g, s, d)
    }

    #[test]
    fn seeding_does_not_count() {
        let (g, _, _) = graph();
        assert_eq!((g.reads(), g.writes()), (0, 0));
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn lists_accumulate_and_singles_replace() {
        let (g, s, _) = graph();
        let mut m = Mutation::new();
        m.set.push(NQuad::value(NodeRef::Existing(s.clone()), "name", Value::string("Herald")));
        m.set.push(NQuad::value(NodeRef::Existing(s.clone()), "languages", Value::string("en")));
        g.mutate(&m).unwrap();
        assert_eq!(g.values(&s, "name"), vec![Value::string("Herald")]);
        assert_eq!(g.values(&s, "languages").len(), 2);
        assert_eq!(g.writes(), 1);
    }

    #[test]
    fn star_delete_clears_before_set() {
        let (g, s, _) = graph();
        let mut m = Mutation::new();
        m.delete.push(NQuad::clear(NodeRef::Existing(s.clone()), "languages"));
        m.set.push(NQuad::value(NodeRef::Existing(s.clone()), "languages", Value::string("fr")));
        g.mutate(&m).unwrap();
        assert_eq!(g.values(&s, "languages"), vec![Value::string("fr")]);
    }

    #[test]
    fn failed_mutation_leaves_state_untouched() {
        let (g, s, _) = graph();
        let mut m = Mutation::new();
        m.set.push(NQuad::value(NodeRef::Existing(s.clone()), "name", Value::string("Changed")));
        m.set.push(NQuad::clear(NodeRef::Existing(s.clone()), "name"));
        assert!(g.mutate(&m).is_err());
        assert_eq!(g.values(&s, "name"), vec![Value::string("Gazette")]);
    }

    #[test]
    fn reverse_edges_and_counts() {
        let (g, s, _) = graph();
        let q = Query::new("q", Func::Uid(vec![s.clone()]))
            .select(Selection::field("name"))
            .select(Selection::Edge(
                Edge::new("sources_included", Selection::fields(&["name"]))
                    .reverse()
                    .alias("included_in")
                    .with_facets(),
            ))
            .select(Selection::Count {
                alias: "datasets".into(),
                predicate: "sources_included".into(),
                reverse: true,
                filter: Some(Filter::of_type("Dataset")),
            });
        let data = g.query(&q).unwrap();
        let row = &data["q"][0];
        assert_eq!(row["name"], json!("Gazette"));
        assert_eq!(row["included_in"][0]["name"], json!("Corpus"));
        assert_eq!(row["included_in"][0]["~sources_included|note"], json!("all"));
        assert_eq!(row["datasets"], json!(1));
        assert_eq!(g.reads(), 1);
    }

    #[test]
    fn filters_order_and_missing_uids() {
        let (g, s, d) = graph();
        let q = Query::new("q", Func::Has("name".into()))
            .order_asc("name")
            .select_all(Selection::fields(&["uid", "name"]));
        let data = g.query(&q).unwrap();
        assert_eq!(data["q"][0]["uid"], json!(d.as_str()));
        assert_eq!(data["q"][1]["uid"], json!(s.as_str()));

        let q = Query::new("q", Func::Type("Source".into()))
            .filter(Filter::AnyOfTerms {
                predicate: "name".into(),
                terms: "gazette herald".into(),
            })
            .select(Selection::field("languages"));
        assert_eq!(g.query(&q).unwrap()["q"][0]["languages"], json!(["en", "de"]));

        let q = Query::new("q", Func::Uid(vec![Uid::from_u64(999)])).select(Selection::field("uid"));
        assert_eq!(g.query(&q).unwrap()["q"], json!([]));
    }

    #[test]
    fn schema_lists_ignore_type_blocks() {
        let lists = list_predicates("a: [string] .\nb: string .\ntype T {\n  a\n  b\n}\n<c>: [uid] .");
        assert_eq!(lists, BTreeSet::from(["a".to_string(), "c".to_string()]));
    }
}
