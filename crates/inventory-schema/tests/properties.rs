//! Property tests for validation and facet encoding.

use inventory_schema::facets::{fold_facets, split_facets, VALUE_KEY};
use inventory_schema::slug::slugify;
use inventory_schema::{catalog, ChoiceSet, FacetSpec, FacetType, Item, Predicate, Value};
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

/// `validate(raw(validate(x))) == validate(x)` for every accepted `x`.
fn assert_idempotent(p: &Predicate, raw: &JsonValue) -> Result<(), TestCaseError> {
    if let Ok(Some(first)) = p.validate(raw) {
        let second = p
            .validate(&first.to_raw())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(Some(first), second);
    }
    Ok(())
}

fn audience_size() -> Predicate {
    Predicate::list_year("audience_size")
        .facet(FacetSpec::string("unit").with_choices(ChoiceSet::from_keys(&[
            "followers",
            "subscribers",
        ])))
        .facet(FacetSpec::new("count", FacetType::Int))
        .facet(FacetSpec::new("verified", FacetType::Bool))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn string_validation_is_idempotent(s in "\\PC{0,40}") {
        assert_idempotent(&Predicate::string("name"), &json!(s))?;
    }

    #[test]
    fn list_validation_is_idempotent(parts in proptest::collection::vec("[a-zA-Z ]{0,12}", 0..6)) {
        let joined = parts.join(",");
        assert_idempotent(&Predicate::list_string("alternate_names"), &json!(joined))?;
        assert_idempotent(&Predicate::ordered_list("authors", ';'), &json!(parts))?;
    }

    #[test]
    fn date_validation_is_idempotent(y in 1800i32..2100, m in 1u32..=12, d in 1u32..=28) {
        let raw = json!(format!("{y:04}-{m:02}-{d:02}"));
        assert_idempotent(&Predicate::datetime("last_updated"), &raw)?;
        assert_idempotent(&Predicate::year("date_founded"), &raw)?;
    }

    #[test]
    fn subsecond_date_validation_is_idempotent(
        y in 1800i32..2100,
        h in 0u32..24,
        ms in 0u32..1000,
        us in 0u32..1000,
    ) {
        let raw = json!(format!("{y:04}-06-15T{h:02}:30:00.{ms:03}{us:03}Z"));
        assert_idempotent(&Predicate::datetime("last_updated"), &raw)?;
    }

    #[test]
    fn scalar_validation_is_idempotent(n in any::<i32>(), b in any::<bool>(), lon in -180.0f64..180.0, lat in -90.0f64..90.0) {
        assert_idempotent(&Predicate::integer("employees"), &json!(n))?;
        assert_idempotent(&Predicate::boolean("is_ngo"), &json!(b))?;
        assert_idempotent(&Predicate::geo("location_point"), &json!([lon, lat]))?;
    }

    #[test]
    fn choice_validation_is_idempotent(keys in proptest::sample::subsequence(vec!["en", "de", "fr", "it"], 0..4)) {
        let registry = catalog::build().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let languages = registry.get_type("Source").unwrap().predicate("languages").unwrap();
        assert_idempotent(languages, &json!(keys))?;
    }

    #[test]
    fn list_year_validation_is_idempotent(
        rows in proptest::collection::vec((1990i64..2030, proptest::option::of(0i64..1_000_000), any::<bool>()), 0..5)
    ) {
        let raw: Vec<JsonValue> = rows
            .iter()
            .map(|(year, count, followers)| {
                let mut obj = serde_json::Map::new();
                obj.insert(VALUE_KEY.into(), json!(year));
                obj.insert("unit".into(), json!(if *followers { "followers" } else { "subscribers" }));
                if let Some(count) = count {
                    obj.insert("count".into(), json!(count));
                }
                JsonValue::Object(obj)
            })
            .collect();
        assert_idempotent(&audience_size(), &JsonValue::Array(raw))?;
    }

    #[test]
    fn facets_round_trip(
        rows in proptest::collection::vec(
            (any::<i64>(), proptest::option::of("[a-z]{1,8}"), proptest::option::of(any::<i64>()), proptest::option::of(any::<bool>())),
            0..8,
        )
    ) {
        let items: Vec<Item> = rows
            .iter()
            .map(|(value, unit, count, flag)| {
                let mut item = Item::new(Value::Int(*value));
                if let Some(unit) = unit {
                    item = item.with_facet("unit", Value::string(unit.clone()));
                }
                if let Some(count) = count {
                    item = item.with_facet("count", Value::Int(*count));
                }
                if let Some(flag) = flag {
                    item = item.with_facet("flag", Value::Bool(*flag));
                }
                item
            })
            .collect();

        let split = split_facets("audience_size", &items);
        let folded = fold_facets("audience_size", &split).expect("base list present");

        let expected: Vec<BTreeMap<String, JsonValue>> = items
            .iter()
            .map(|item| {
                let mut element = BTreeMap::new();
                element.insert(VALUE_KEY.to_string(), item.value.to_json());
                for (key, facet) in &item.facets {
                    element.insert(key.clone(), facet.to_json());
                }
                element
            })
            .collect();
        prop_assert_eq!(folded.elements, expected);
    }

    #[test]
    fn slugs_are_stable(s in "\\PC{0,40}") {
        let once = slugify(&s, "_");
        prop_assert_eq!(slugify(&once, "_"), once.clone());
        prop_assert!(!once.starts_with('_') && !once.ends_with('_'));
    }
}

#[test]
fn example_source_fields_validate() {
    let registry = catalog::build().unwrap();
    let source = registry.get_type("Source").unwrap();
    let input = json!({
        "name": "Example Gazette",
        "languages": ["en"],
        "geographic_scope": "national",
        "publication_cycle": "daily",
        "payment_model": "free",
        "contains_ads": "no",
    });
    for (key, raw) in input.as_object().unwrap() {
        let p = source.predicate(key).unwrap();
        assert!(p.validate(raw).unwrap().is_some(), "{key}");
    }
}
