//! Unit tests for priority merging.

use rstest::rstest;
use serde_json::{Map, Value, json};

use super::{MergeItem, merge_array, merge_items};
use crate::{ConfigCollection, MemoryCollection, Metadata};

fn metadata(source: &str) -> Metadata {
    let mut map = Map::new();
    map.insert("source".to_owned(), Value::from(source));
    map
}

#[rstest]
#[case::high_first(json!({"a": 1, "b": {"x": true}}), json!({"c": [1], "d": "low"}))]
#[case::low_first(json!({"c": [1], "d": "low"}), json!({"a": 1, "b": {"x": true}}))]
fn disjoint_keys_merge_to_union(#[case] high: Value, #[case] low: Value) {
    let expected = json!({"a": 1, "b": {"x": true}, "c": [1], "d": "low"});
    assert_eq!(merge_array(high, low), expected);
}

#[rstest]
#[case::string(json!("high"), json!("low"))]
#[case::number_over_map(json!(3), json!({"nested": true}))]
#[case::map_over_number(json!({"nested": true}), json!(3))]
#[case::list_over_map(json!(["a"]), json!({"nested": true}))]
#[case::null_over_string(Value::Null, json!("low"))]
fn shared_named_key_with_mismatched_values_takes_high(#[case] high: Value, #[case] low: Value) {
    let merged = merge_array(json!({"k": high.clone()}), json!({"k": low}));
    assert_eq!(merged.get("k"), Some(&high));
}

#[test]
fn shared_named_maps_merge_recursively() {
    let high = json!({"db": {"host": "primary", "pool": {"max": 20}}});
    let low = json!({"db": {"host": "localhost", "port": 5432, "pool": {"min": 1}}});
    let expected_inner = merge_array(
        json!({"host": "primary", "pool": {"max": 20}}),
        json!({"host": "localhost", "port": 5432, "pool": {"min": 1}}),
    );

    let merged = merge_array(high, low);

    assert_eq!(merged.get("db"), Some(&expected_inner));
    assert_eq!(
        expected_inner,
        json!({"host": "primary", "port": 5432, "pool": {"min": 1, "max": 20}})
    );
}

#[test]
fn indexed_entries_append_after_existing_entries() {
    let high = json!(["c", {"d": 1}]);
    let low = json!(["a", "b", {"d": 0}]);

    let merged = merge_array(high, low);

    assert_eq!(merged, json!(["a", "b", {"d": 0}, "c", {"d": 1}]));
    assert_eq!(merged.as_array().map(Vec::len), Some(5));
}

#[test]
fn nested_lists_under_named_keys_accumulate() {
    let merged = merge_array(json!({"paths": ["/b"]}), json!({"paths": ["/a"]}));
    assert_eq!(merged, json!({"paths": ["/a", "/b"]}));
}

#[test]
fn existing_key_order_is_preserved() {
    let merged = merge_array(json!({"b": 2, "z": 26}), json!({"a": 1, "b": 0, "c": 3}));
    let keys: Vec<&str> = merged
        .as_object()
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default();
    assert_eq!(keys, ["a", "b", "c", "z"]);
}

#[test]
fn merge_items_sets_missing_classes_directly() {
    let mut target = MemoryCollection::with_tracking(true);
    let item = MergeItem::new("Mailer", json!({"tls": true})).with_metadata(metadata("base"));

    assert!(merge_items([item], &mut target).is_ok());

    assert_eq!(target.get("mailer", None, false).ok().flatten(), Some(json!({"tls": true})));
    assert_eq!(
        target.metadata().ok().and_then(|m| m.get("mailer").cloned()),
        Some(metadata("base"))
    );
    assert!(target.history().is_ok_and(|h| h.is_empty()));
}

#[test]
fn merge_items_inherits_metadata_only_when_incoming_has_none() {
    let mut target = MemoryCollection::with_tracking(true);
    let seeded = merge_items(
        [MergeItem::new("cache", json!({"ttl": 10})).with_metadata(metadata("base"))],
        &mut target,
    );
    assert!(seeded.is_ok());

    assert!(merge_items([MergeItem::new("cache", json!({"ttl": 20}))], &mut target).is_ok());
    let inherited = target.metadata().ok().and_then(|m| m.get("cache").cloned());
    assert_eq!(inherited, Some(metadata("base")));

    let overridden = merge_items(
        [MergeItem::new("cache", json!({"ttl": 30})).with_metadata(metadata("override"))],
        &mut target,
    );
    assert!(overridden.is_ok());
    let replaced = target.metadata().ok().and_then(|m| m.get("cache").cloned());
    assert_eq!(replaced, Some(metadata("override")));
    assert_eq!(target.get("cache", Some("ttl"), false).ok().flatten(), Some(json!(30)));
}

#[test]
fn merge_items_is_not_idempotent_for_sequence_fields() {
    let x = || MergeItem::new("router", json!({"routes": ["/x"], "strict": true}));
    let mut once = MemoryCollection::new();
    let mut twice = MemoryCollection::new();
    for target in [&mut once, &mut twice] {
        assert!(merge_items([MergeItem::new("router", json!({"routes": ["/y"]}))], target).is_ok());
        assert!(merge_items([x()], target).is_ok());
    }
    assert!(merge_items([x()], &mut twice).is_ok());

    let once_value = once.get("router", None, false).ok().flatten();
    let twice_value = twice.get("router", None, false).ok().flatten();
    assert_eq!(once_value, Some(json!({"routes": ["/y", "/x"], "strict": true})));
    assert_eq!(twice_value, Some(json!({"routes": ["/y", "/x", "/x"], "strict": true})));
    assert_ne!(once_value, twice_value);
}

#[test]
fn merge_items_replaces_scalar_class_values() {
    let mut target = MemoryCollection::new();
    let items = [
        MergeItem::new("banner", json!("hello")),
        MergeItem::new("BANNER", json!("goodbye")),
    ];
    assert!(merge_items(items, &mut target).is_ok());
    assert_eq!(target.get("banner", None, false).ok().flatten(), Some(json!("goodbye")));
}
