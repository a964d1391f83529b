//! Reader behaviour against a seeded in-memory store.

use chrono::{Datelike, TimeZone, Utc};
use inventory_schema::schema::TYPE_PREDICATE;
use inventory_schema::{catalog, BlankId, Facets, NodeRef, Registry, Uid, Value};
use inventory_store::{
    EntrySelector, Field, Filter, GraphClient, ListRequest, MemoryGraph, Mutation, NQuad,
    Projection, Reader, StoreConfig,
};
use std::sync::Arc;

struct Fixture {
    registry: Registry,
    graph: Arc<MemoryGraph>,
    client: GraphClient,
    source: Uid,
    dataset: Uid,
    channel: Uid,
    user: Uid,
}

fn node(label: &str) -> NodeRef {
    NodeRef::New(BlankId::new(label).unwrap())
}

fn typed(m: &mut Mutation, label: &str, types: &[&str]) {
    for t in types {
        m.set.push(NQuad::value(node(label), TYPE_PREDICATE, Value::string(*t)));
    }
}

fn set(m: &mut Mutation, label: &str, predicate: &str, value: Value) {
    m.set.push(NQuad::value(node(label), predicate, value));
}

fn fixture() -> Fixture {
    let registry = catalog::build().unwrap();
    let graph = Arc::new(MemoryGraph::new());
    let client = GraphClient::with_backend(graph.clone(), StoreConfig::default());
    client.alter(&registry.generate_storage_schema()).unwrap();

    let mut m = Mutation::new();
    typed(&mut m, "user", &["User"]);
    set(&mut m, "user", "display_name", Value::string("reviewer"));
    set(&mut m, "user", "role", Value::Int(2));
    set(&mut m, "user", "pw", Value::Password("hunter2".into()));

    typed(&mut m, "channel", &["Channel"]);
    set(&mut m, "channel", "name", Value::string("Print"));
    set(&mut m, "channel", "unique_name", Value::string("print"));

    typed(&mut m, "source", &["Entry", "Source"]);
    set(&mut m, "source", "name", Value::string("Example Gazette"));
    set(&mut m, "source", "unique_name", Value::string("example_gazette"));
    set(&mut m, "source", "description", Value::string("First line.\n\nSecond line."));
    set(&mut m, "source", "languages", Value::string("en"));
    set(&mut m, "source", "languages", Value::string("de"));
    set(&mut m, "source", "channel", Value::Node(node("channel")));
    set(&mut m, "source", catalog::DATE_CREATED, Value::DateTime(Utc.with_ymd_and_hms(2023, 3, 1, 8, 0, 0).unwrap()));
    for (year, count) in [(2021, 1200), (2022, 1800)] {
        let when = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        let facets = Facets::from([
            ("unit".to_string(), Value::string("followers")),
            ("count".to_string(), Value::Int(count)),
        ]);
        m.set.push(NQuad::value(node("source"), "audience_size", Value::DateTime(when)).with_facets(facets));
    }
    let stamp = Facets::from([
        ("ip".to_string(), Value::string("10.0.0.1")),
        ("timestamp".to_string(), Value::DateTime(Utc.with_ymd_and_hms(2023, 3, 1, 8, 0, 0).unwrap())),
    ]);
    m.set.push(NQuad::value(node("source"), catalog::ENTRY_ADDED, Value::Node(node("user"))).with_facets(stamp));

    typed(&mut m, "dataset", &["Entry", "Dataset"]);
    set(&mut m, "dataset", "name", Value::string("Corpus"));
    for (i, author) in ["Roe", "Doe"].iter().enumerate() {
        let facets = Facets::from([("sequence".to_string(), Value::Int(1 - i as i64))]);
        m.set.push(NQuad::value(node("dataset"), "authors", Value::string(*author)).with_facets(facets));
    }
    set(&mut m, "dataset", "sources_included", Value::Node(node("source")));

    let resp = graph.seed(&m).unwrap();
    let uid = |label: &str| resp.uid_for(&BlankId::new(label).unwrap()).unwrap().clone();
    Fixture {
        source: uid("source"),
        dataset: uid("dataset"),
        channel: uid("channel"),
        user: uid("user"),
        registry,
        graph,
        client,
    }
}

#[test]
fn get_entry_decodes_dates_facets_and_reverse_edges() {
    let fx = fixture();
    let reader = Reader::new(&fx.client, &fx.registry);
    let doc = reader
        .get_entry(&EntrySelector::UniqueName("Example_Gazette ".into()), None)
        .unwrap()
        .expect("entry exists");

    assert_eq!(doc.uid(), Some(fx.source.clone()));
    assert_eq!(doc.types(), vec!["Entry", "Source"]);
    assert_eq!(doc.get(catalog::DATE_CREATED).and_then(Field::as_date).map(|d| d.year()), Some(2023));

    let Some(Field::Faceted(audience)) = doc.get("audience_size") else {
        panic!("audience_size should fold into per-element maps");
    };
    assert_eq!(audience.len(), 2);
    assert_eq!(audience[1]["count"], Field::Int(1800));
    assert_eq!(audience[0]["unit"], Field::Text("followers".into()));
    assert!(matches!(audience[0]["value"], Field::Date(_)));

    let channel = doc.get("channel").unwrap().elements()[0].as_node().unwrap();
    assert_eq!(channel.text("name"), Some("Print"));

    let added = doc.get(catalog::ENTRY_ADDED).unwrap().elements()[0].as_node().unwrap();
    assert_eq!(added.uid(), Some(fx.user.clone()));
    assert_eq!(added.facets["ip"], Field::Text("10.0.0.1".into()));
    assert!(matches!(added.facets["timestamp"], Field::Date(_)));

    let included = doc.get("included_in").unwrap().elements();
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].as_node().unwrap().text("name"), Some("Corpus"));
}

#[test]
fn get_entry_adds_conveniences_and_keeps_raw_text() {
    let fx = fixture();
    let reader = Reader::new(&fx.client, &fx.registry);
    let doc = reader
        .get_entry(&EntrySelector::Uid(fx.source.clone()), Some("source"))
        .unwrap()
        .unwrap();
    assert_eq!(doc.text("description"), Some("First line.\n\nSecond line."));
    assert_eq!(
        doc.get("description_paragraphs"),
        Some(&Field::List(vec![
            Field::Text("First line.".into()),
            Field::Text("Second line.".into())
        ]))
    );
    let pretty: Vec<&str> = doc
        .get("languages_pretty")
        .unwrap()
        .elements()
        .iter()
        .filter_map(Field::as_str)
        .collect();
    assert_eq!(pretty, vec!["English", "German"]);
}

#[test]
fn ordered_lists_and_counts() {
    let fx = fixture();
    let reader = Reader::new(&fx.client, &fx.registry);
    let doc = reader
        .get_entry(&EntrySelector::Uid(fx.dataset.clone()), None)
        .unwrap()
        .unwrap();
    assert_eq!(
        doc.get("authors"),
        Some(&Field::List(vec![Field::Text("Doe".into()), Field::Text("Roe".into())]))
    );
    assert_eq!(doc.get("num_sources"), Some(&Field::Int(1)));

    let channel = reader.get_entry(&EntrySelector::Uid(fx.channel.clone()), None).unwrap().unwrap();
    assert_eq!(channel.get("num_sources"), Some(&Field::Int(1)));
}

#[test]
fn missing_entries_are_none() {
    let fx = fixture();
    let reader = Reader::new(&fx.client, &fx.registry);
    assert!(reader
        .get_entry(&EntrySelector::UniqueName("nothing_here".into()), None)
        .unwrap()
        .is_none());
    assert!(reader.check_entry(&Uid::from_u64(0xfff)).unwrap().is_none());
    assert!(reader
        .list_by_type(&ListRequest::new("Source").filter(Filter::eq("name", "Nope")))
        .unwrap()
        .is_none());
    assert!(reader.get_rejected(&fx.source).unwrap().is_none());
}

#[test]
fn list_by_type_with_relation_filter_and_projection() {
    let fx = fixture();
    let reader = Reader::new(&fx.client, &fx.registry);

    let all = reader.list_by_type(&ListRequest::new("Source")).unwrap().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].get("languages").is_some(), "queryable predicates are listed");

    let by_channel = ListRequest::new("Source")
        .related("channel", Filter::eq("unique_name", "print"))
        .projection(Projection::Fields(vec!["name".into()]));
    let rows = reader.list_by_type(&by_channel).unwrap().unwrap();
    assert_eq!(rows[0].text("name"), Some("Example Gazette"));
    assert!(rows[0].get("languages").is_none());

    let none = ListRequest::new("Source").related("channel", Filter::eq("unique_name", "radio"));
    assert!(reader.list_by_type(&none).unwrap().is_none());

    let bad = ListRequest::new("Source").projection(Projection::Fields(vec!["nope".into()]));
    assert!(reader.list_by_type(&bad).is_err());
}

#[test]
fn entry_checks_and_users() {
    let fx = fixture();
    let reader = Reader::new(&fx.client, &fx.registry);

    let check = reader.check_entry(&fx.source).unwrap().unwrap();
    assert_eq!(check.unique_name.as_deref(), Some("example_gazette"));
    assert_eq!(check.added_by, Some(fx.user.clone()));
    assert!(check.types.iter().any(|t| t == "Source"));

    assert_eq!(reader.get_uid("unique_name", "print").unwrap(), Some(fx.channel.clone()));

    let types = reader.node_types(&[fx.channel.clone(), Uid::from_u64(0xfff)]).unwrap();
    assert_eq!(types.len(), 1);
    assert_eq!(types[&fx.channel], vec!["Channel".to_string()]);

    let user = reader.get_user(&fx.user).unwrap().unwrap();
    assert_eq!(user.role, inventory_schema::Role::Reviewer);
    assert!(reader.get_user(&fx.source).unwrap().is_none());

    let raw = reader.get_entry(&EntrySelector::Uid(fx.user.clone()), None).unwrap().unwrap();
    assert!(raw.get("pw").is_none(), "passwords are never read back");
    assert!(fx.graph.reads() > 0);
    assert_eq!(fx.graph.writes(), 0);
}
