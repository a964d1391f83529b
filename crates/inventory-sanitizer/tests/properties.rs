//! Property tests for permission gating and unique-name allocation.

use inventory_sanitizer::{SanitizeError, Sanitizer, SanitizerContext, User};
use inventory_schema::slug::slugify;
use inventory_schema::{catalog, Role, Uid};
use inventory_store::{GraphClient, MemoryGraph, StoreConfig};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn empty_store() -> (SanitizerContext, Arc<MemoryGraph>) {
    let registry = catalog::build().unwrap();
    let graph = Arc::new(MemoryGraph::new());
    let client = GraphClient::with_backend(graph.clone(), StoreConfig::default());
    client.alter(&registry.generate_storage_schema()).unwrap();
    (SanitizerContext::new(Arc::new(registry), client), graph)
}

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Anonymous),
        Just(Role::Contributor),
        Just(Role::Reviewer),
        Just(Role::Admin),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn gate_refuses_without_storage_access(
        role in role(),
        type_index in 0usize..32,
        payload in proptest::collection::btree_map("[a-z_]{1,12}", "[a-zA-Z0-9 ]{0,12}", 0..5),
    ) {
        let (ctx, graph) = empty_store();
        let types: Vec<_> = ctx.registry.types().collect();
        let entity = types[type_index % types.len()];
        let user = User::new(Uid::from_u64(7), role);
        let data = serde_json::to_value(&payload).unwrap();

        let result = Sanitizer::create(&ctx, &entity.name, &data, &user, "ip");
        if role < entity.create {
            prop_assert!(matches!(result, Err(SanitizeError::Permission(_))));
            prop_assert_eq!(graph.reads(), 0);
            prop_assert_eq!(graph.writes(), 0);
        } else if payload.is_empty() {
            prop_assert!(!matches!(result, Err(SanitizeError::Permission(_))));
        }
    }

    #[test]
    fn derived_unique_names_are_slugs(name in "[A-Za-z][A-Za-z0-9 ]{0,24}") {
        let (ctx, _) = empty_store();
        let user = User::new(Uid::from_u64(7), Role::Contributor);
        let s = Sanitizer::create(&ctx, "Person", &json!({"name": name}), &user, "ip").unwrap();
        let unique = s.entry().fields.str_value("unique_name").unwrap();
        prop_assert_eq!(unique, slugify(&name, "_"));
        prop_assert!(unique.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }
}
