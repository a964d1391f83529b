//! Integration tests for the complete inventory pipeline
//!
//! These tests verify end-to-end behaviour across crates:
//! - Catalog → storage schema → in-memory store
//! - Raw submission → Sanitizer → Mutation → commit → Reader
//! - Permission gates, unique names, upserts and rejections
//!
//! Run with: cargo test --test integration_tests

use inventory_sanitizer::{SanitizeError, Sanitizer, SanitizerContext, User};
use inventory_schema::catalog::{self, ENTRY_ADDED, REVIEW_STATUS};
use inventory_schema::schema::TYPE_PREDICATE;
use inventory_schema::{BlankId, NodeRef, Role, Uid, Value};
use inventory_store::{
    EntrySelector, Field, GraphClient, ListRequest, MemoryGraph, Mutation, NQuad, Reader,
    StoreConfig,
};
use serde_json::json;
use std::sync::Arc;

struct World {
    ctx: SanitizerContext,
    graph: Arc<MemoryGraph>,
    contributor: User,
    reviewer: User,
    channel: Uid,
    country: Uid,
}

fn blank(label: &str) -> NodeRef {
    NodeRef::New(BlankId::new(label).unwrap())
}

fn world() -> World {
    let registry = catalog::build().expect("catalog builds");
    let graph = Arc::new(MemoryGraph::new());
    let client = GraphClient::with_backend(graph.clone(), StoreConfig::default());
    client.alter(&registry.generate_storage_schema()).unwrap();

    let mut seed = Mutation::new();
    let mut add = |label: &str, predicate: &str, value: Value| {
        seed.set.push(NQuad::value(blank(label), predicate, value));
    };
    add("contributor", TYPE_PREDICATE, Value::string("User"));
    add("contributor", "role", Value::Int(1));
    add("reviewer", TYPE_PREDICATE, Value::string("User"));
    add("reviewer", "role", Value::Int(2));
    for (label, kind, name) in [("channel", "Channel", "Website"), ("country", "Country", "Germany")] {
        add(label, TYPE_PREDICATE, Value::string("Entry"));
        add(label, TYPE_PREDICATE, Value::string(kind));
        add(label, "name", Value::string(name));
        add(label, "unique_name", Value::string(name.to_lowercase()));
    }
    add("country", "iso_3166_1_2", Value::string("DE"));

    let resp = graph.seed(&seed).unwrap();
    let uid = |label: &str| resp.uid_for(&BlankId::new(label).unwrap()).unwrap().clone();
    World {
        ctx: SanitizerContext::new(Arc::new(registry), client),
        contributor: User::new(uid("contributor"), Role::Contributor),
        reviewer: User::new(uid("reviewer"), Role::Reviewer),
        channel: uid("channel"),
        country: uid("country"),
        graph,
    }
}

fn gazette(w: &World) -> serde_json::Value {
    json!({
        "name": "Example Gazette",
        "channel": w.channel.to_string(),
        "country": w.country.to_string(),
        "languages": ["en"],
        "geographic_scope": "national",
        "publication_cycle": "daily",
        "payment_model": "free",
        "contains_ads": "no",
    })
}

// ============================================================================
// Create
// ============================================================================

#[test]
fn test_contributor_submission_round_trip() {
    let w = world();
    let s = Sanitizer::create(&w.ctx, "Source", &gazette(&w), &w.contributor, "192.0.2.7")
        .expect("valid submission");
    let uid = s.commit(&w.ctx.client).expect("commit");

    let reader = Reader::new(&w.ctx.client, &w.ctx.registry);
    let doc = reader
        .get_entry(&EntrySelector::Uid(uid.clone()), None)
        .unwrap()
        .expect("entry readable after commit");

    assert_eq!(doc.text(REVIEW_STATUS), Some("pending"));
    assert_eq!(doc.text("unique_name"), Some("example_gazette"));
    let types = doc.types();
    assert!(types.contains(&"Entry") && types.contains(&"Source"), "{types:?}");

    let added = doc.get(ENTRY_ADDED).unwrap().elements()[0].as_node().unwrap();
    assert_eq!(added.uid(), Some(w.contributor.uid.clone()));
    assert_eq!(added.facets.get("ip"), Some(&Field::Text("192.0.2.7".into())));
    assert!(matches!(added.facets.get("timestamp"), Some(Field::Date(_))));

    let channel = doc.get("channel").unwrap().elements()[0].as_node().unwrap();
    assert_eq!(channel.uid(), Some(w.channel.clone()));
}

#[test]
fn test_anonymous_submission_touches_nothing() {
    let w = world();
    let anonymous = User::new(Uid::from_u64(0xfff), Role::Anonymous);
    let (reads, writes) = (w.graph.reads(), w.graph.writes());

    let err = Sanitizer::create(&w.ctx, "Source", &gazette(&w), &anonymous, "192.0.2.7").unwrap_err();
    assert!(matches!(err, SanitizeError::Permission(_)), "{err}");
    assert_eq!(w.graph.reads(), reads);
    assert_eq!(w.graph.writes(), writes);
}

#[test]
fn test_every_role_below_threshold_is_refused_before_storage() {
    let w = world();
    for entity in w.ctx.registry.types() {
        for role in [Role::Anonymous, Role::Contributor, Role::Reviewer, Role::Admin] {
            if role >= entity.create {
                continue;
            }
            let user = User::new(w.contributor.uid.clone(), role);
            let reads = w.graph.reads();
            let err = Sanitizer::create(&w.ctx, &entity.name, &json!({"name": "x"}), &user, "ip")
                .unwrap_err();
            assert!(matches!(err, SanitizeError::Permission(_)), "{} as {role}", entity.name);
            assert_eq!(w.graph.reads(), reads, "{} as {role}", entity.name);
        }
    }
}

#[test]
fn test_duplicate_names_get_distinct_unique_names() {
    let w = world();
    let first = Sanitizer::create(&w.ctx, "Source", &gazette(&w), &w.contributor, "ip").unwrap();
    first.commit(&w.ctx.client).unwrap();
    let second = Sanitizer::create(&w.ctx, "Source", &gazette(&w), &w.contributor, "ip").unwrap();

    let name = second.entry().fields.str_value("unique_name").unwrap();
    assert_ne!(name, "example_gazette");
    let suffix = name.strip_prefix("example_gazette_").expect("suffixed");
    assert_eq!(suffix.len(), 6);
}

#[test]
fn test_malformed_relationship_names_the_field() {
    let w = world();
    for bad in [json!("not a uid"), json!(42), json!({"name": "Inline Channel"})] {
        let mut data = gazette(&w);
        data["channel"] = bad.clone();
        let err = Sanitizer::create(&w.ctx, "Source", &data, &w.contributor, "ip").unwrap_err();
        assert!(matches!(err, SanitizeError::Validation(_)), "{bad}: {err}");
        assert_eq!(err.offending_field(), Some("channel"), "{bad}");
    }
}

// ============================================================================
// Edit
// ============================================================================

#[test]
fn test_edit_of_missing_node_is_not_found() {
    let w = world();
    let err = Sanitizer::edit(&w.ctx, &json!({"uid": "0xbeef", "name": "x"}), &w.reviewer, "ip")
        .unwrap_err();
    assert!(matches!(err, SanitizeError::NotFound(_)), "{err}");
}

#[test]
fn test_overwrite_predicates_always_clear() {
    let w = world();
    let mut data = gazette(&w);
    data["alternate_names"] = json!(["EG"]);
    let uid = Sanitizer::create(&w.ctx, "Source", &data, &w.contributor, "ip")
        .unwrap()
        .commit(&w.ctx.client)
        .unwrap();

    let superset = json!({"uid": uid.to_string(), "alternate_names": ["EG", "Gazette"]});
    let s = Sanitizer::edit(&w.ctx, &superset, &w.contributor, "ip").unwrap();
    assert!(
        s.delete_nquads().contains(&format!("<{uid}> <alternate_names> * .")),
        "{}",
        s.delete_nquads()
    );
    s.commit(&w.ctx.client).unwrap();

    let mut stored: Vec<Value> = w.graph.values(&uid, "alternate_names");
    stored.sort_by_key(|v| v.as_str().map(str::to_string));
    assert_eq!(stored, vec![Value::string("EG"), Value::string("Gazette")]);
}

#[test]
fn test_edit_can_empty_an_overwrite_list() {
    let w = world();
    let mut data = gazette(&w);
    data["alternate_names"] = json!(["EG"]);
    let uid = Sanitizer::create(&w.ctx, "Source", &data, &w.contributor, "ip")
        .unwrap()
        .commit(&w.ctx.client)
        .unwrap();

    let emptied = json!({"uid": uid.to_string(), "alternate_names": ""});
    let s = Sanitizer::edit(&w.ctx, &emptied, &w.contributor, "ip").unwrap();
    assert!(s.delete_nquads().contains(&format!("<{uid}> <alternate_names> * .")));
    s.commit(&w.ctx.client).unwrap();
    assert!(w.graph.values(&uid, "alternate_names").is_empty());
}

#[test]
fn test_same_named_new_targets_are_stored_under_distinct_names() {
    let w = world();
    let org = json!({"name": "Acme", "owns": ["Sub Corp", "Sub Corp"]});
    let s = Sanitizer::create(&w.ctx, "Organization", &org, &w.contributor, "ip").unwrap();
    s.commit(&w.ctx.client).unwrap();

    let reader = Reader::new(&w.ctx.client, &w.ctx.registry);
    let mut names: Vec<String> = reader
        .list_by_type(&ListRequest::new("Organization"))
        .unwrap()
        .unwrap_or_default()
        .iter()
        .filter_map(|d| d.text("unique_name").map(str::to_string))
        .collect();
    names.sort();
    assert_eq!(names.len(), 3, "{names:?}");
    names.dedup();
    assert_eq!(names.len(), 3, "{names:?}");
}

// ============================================================================
// Review
// ============================================================================

#[test]
fn test_rejected_entries_leave_listings() {
    let w = world();
    let uid = Sanitizer::create(&w.ctx, "Source", &gazette(&w), &w.contributor, "ip")
        .unwrap()
        .commit(&w.ctx.client)
        .unwrap();
    let reader = Reader::new(&w.ctx.client, &w.ctx.registry);
    assert_eq!(reader.list_by_type(&ListRequest::new("Source")).unwrap().map(|d| d.len()), Some(1));

    Sanitizer::reject(&w.ctx, &uid, &w.reviewer, "ip")
        .unwrap()
        .commit(&w.ctx.client)
        .unwrap();
    assert_eq!(reader.list_by_type(&ListRequest::new("Source")).unwrap(), None);
    let archived = reader.get_rejected(&uid).unwrap().expect("archived");
    assert_eq!(
        archived.get(catalog::FORMER_TYPES).map(|f| f.elements().len()),
        Some(2)
    );
}
