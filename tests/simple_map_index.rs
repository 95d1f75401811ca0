// Index collection-splitting/reference-sharing and corruption tolerance
// (§8.4), driven against a SafeHashMap-backed cache of entries rather than
// against the index in isolation.

use coherence_rs::index::{ExtractedValue, MapIndex, ValueExtractor};
use coherence_rs::{SafeHashMap, SimpleMapIndex};
use std::sync::Arc;

#[derive(Clone)]
struct Account {
    tags: Vec<&'static str>,
}

struct TagExtractor;

impl ValueExtractor<Account> for TagExtractor {
    type Extracted = &'static str;

    fn extract(&self, value: &Account) -> coherence_rs::Result<ExtractedValue<&'static str>> {
        Ok(ExtractedValue::Collection(value.tags.clone()))
    }
}

#[test]
fn index_stays_consistent_with_backing_cache() {
    let cache: SafeHashMap<u32, Account> = SafeHashMap::new();
    let index: SimpleMapIndex<u32, Account, TagExtractor> = SimpleMapIndex::new(TagExtractor);

    let a1 = Account {
        tags: vec!["gold", "active"],
    };
    let a2 = Account {
        tags: vec!["gold", "active"],
    };
    cache.put(1, a1.clone());
    cache.put(2, a2.clone());
    index.insert(&1, &a1).unwrap();
    index.insert(&2, &a2).unwrap();

    let forward_1 = index.get(&1).unwrap();
    let forward_2 = index.get(&2).unwrap();
    assert!(Arc::ptr_eq(&forward_1, &forward_2));

    let gold_holders = index
        .contents()
        .into_iter()
        .find(|(ev, _)| matches!(ev, ExtractedValue::Scalar(tag) if *tag == "gold"))
        .map(|(_, keys)| keys)
        .unwrap();
    assert!(gold_holders.contains(&1));
    assert!(gold_holders.contains(&2));

    let a2_updated = Account {
        tags: vec!["gold", "lapsed"],
    };
    cache.put(2, a2_updated.clone());
    index.update(&2, &a2, &a2_updated).unwrap();

    let active_holders = index
        .contents()
        .into_iter()
        .find(|(ev, _)| matches!(ev, ExtractedValue::Scalar(tag) if *tag == "active"));
    assert!(active_holders.map(|(_, keys)| keys.len()).unwrap_or(0) <= 1);
}
