// The concrete inverted-index engine (§4.F). Grounded on
// `original_source/src/coherence/util/SimpleMapIndex.cpp`'s `insert`,
// `update`, `remove`, `addInverseMapping`, `addInverseCollectionMapping`
// (reference-sharing threshold), and `removeInverseMapping`; lock and
// per-index texture borrowed from `harborgrid-justin-rusty-db`'s
// `index/hash_index.rs`.

use crate::error::Result;
use crate::index::{ExtractedValue, MapIndex, ValueExtractor};
use crate::map::lite_set::LiteSet;
use crate::map::tree_map::TreeMap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Tuning knobs for a [`SimpleMapIndex`] (§4.F, §9 Open Questions).
#[derive(Debug, Clone)]
pub struct SimpleMapIndexConfig {
    /// Below this many candidate keys, reference-sharing search intersects
    /// the inverse key sets of the collection's elements; at or above it,
    /// the forward map is scanned directly instead (§4.F
    /// "Collection-splitting and reference-sharing").
    pub reference_sharing_threshold: usize,
    /// Maximum number of extraction-failure warnings logged per
    /// `log_rate_window` (§7 "Indexing failure").
    pub log_rate_limit: usize,
    pub log_rate_window: Duration,
    /// Whether the inverse map is kept in a navigable [`TreeMap`] (ordered)
    /// or an unordered `HashMap`.
    pub ordered: bool,
}

impl Default for SimpleMapIndexConfig {
    fn default() -> Self {
        Self {
            reference_sharing_threshold: 50,
            log_rate_limit: 10,
            log_rate_window: Duration::from_secs(300),
            ordered: false,
        }
    }
}

enum Inverse<E, K> {
    Hash(HashMap<ExtractedValue<E>, LiteSet<K>>),
    Ordered(TreeMap<ExtractedValue<E>, LiteSet<K>>),
}

impl<E, K> Inverse<E, K>
where
    E: Clone + Eq + Hash + Ord + Send + Sync,
    K: Clone + Eq + Hash + Send + Sync,
{
    fn get(&self, ev: &ExtractedValue<E>) -> Option<LiteSet<K>> {
        match self {
            Inverse::Hash(map) => map.get(ev).cloned(),
            Inverse::Ordered(tree) => tree.get(ev),
        }
    }

    fn add_key(&mut self, ev: ExtractedValue<E>, key: K) {
        match self {
            Inverse::Hash(map) => {
                map.entry(ev).or_insert_with(LiteSet::new).insert(key);
            }
            Inverse::Ordered(tree) => {
                let mut set = tree.get(&ev).unwrap_or_default();
                set.insert(key);
                tree.put(ev, set).expect("inverse map has unbounded view");
            }
        }
    }

    fn remove_key(&mut self, ev: &ExtractedValue<E>, key: &K) {
        match self {
            Inverse::Hash(map) => {
                let mut empty = false;
                if let Some(set) = map.get_mut(ev) {
                    set.remove(key);
                    empty = set.is_empty();
                }
                if empty {
                    map.remove(ev);
                }
            }
            Inverse::Ordered(tree) => {
                if let Some(mut set) = tree.get(ev) {
                    set.remove(key);
                    if set.is_empty() {
                        let _ = tree.remove(ev);
                    } else {
                        tree.put(ev.clone(), set).expect("inverse map has unbounded view");
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Inverse::Hash(map) => map.len(),
            Inverse::Ordered(tree) => tree.len(),
        }
    }

    fn snapshot(&self) -> Vec<(ExtractedValue<E>, LiteSet<K>)> {
        match self {
            Inverse::Hash(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Inverse::Ordered(tree) => tree.iter().collect(),
        }
    }
}

struct State<E, K> {
    forward: HashMap<K, Arc<ExtractedValue<E>>>,
    inverse: Inverse<E, K>,
    excluded: HashSet<K>,
}

struct LogBudget {
    count: usize,
    window_start: Instant,
}

/// A dual forward/inverse index built from a [`ValueExtractor`] (§4.F).
///
/// `insert`/`update`/`remove` never propagate extractor failures as
/// [`CacheError`](crate::error::CacheError): a key whose value can't be
/// extracted is recorded in `excluded` and left out of the inverse map,
/// exactly as if it were absent from the index (§7 "Indexing failure").
pub struct SimpleMapIndex<K, V, X>
where
    X: ValueExtractor<V>,
{
    extractor: X,
    config: SimpleMapIndexConfig,
    state: Mutex<State<X::Extracted, K>>,
    log_budget: Mutex<LogBudget>,
    _value: std::marker::PhantomData<fn(&V)>,
}

impl<K, V, X> SimpleMapIndex<K, V, X>
where
    K: Clone + Eq + Hash + Send + Sync,
    X: ValueExtractor<V>,
{
    pub fn new(extractor: X) -> Self {
        Self::with_config(extractor, SimpleMapIndexConfig::default())
    }

    pub fn with_config(extractor: X, config: SimpleMapIndexConfig) -> Self {
        let inverse = if config.ordered {
            Inverse::Ordered(TreeMap::new())
        } else {
            Inverse::Hash(HashMap::new())
        };
        Self {
            extractor,
            config,
            state: Mutex::new(State {
                forward: HashMap::new(),
                inverse,
                excluded: HashSet::new(),
            }),
            log_budget: Mutex::new(LogBudget {
                count: 0,
                window_start: Instant::now(),
            }),
            _value: std::marker::PhantomData,
        }
    }

    /// The indexed value currently on record for `key`, if any (§4.F
    /// "Forward index map").
    pub fn get(&self, key: &K) -> Option<Arc<ExtractedValue<X::Extracted>>> {
        self.state.lock().forward.get(key).cloned()
    }

    /// Keys excluded from the index because extraction failed for their
    /// value (§7 "Indexing failure").
    pub fn excluded_keys(&self) -> Vec<K> {
        self.state.lock().excluded.iter().cloned().collect()
    }

    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    pub fn contents(&self) -> Vec<(ExtractedValue<X::Extracted>, LiteSet<K>)> {
        self.state.lock().inverse.snapshot()
    }

    fn log_excluded(&self, key: &K)
    where
        K: std::fmt::Debug,
    {
        let mut budget = self.log_budget.lock();
        if budget.window_start.elapsed() >= self.config.log_rate_window {
            budget.window_start = Instant::now();
            budget.count = 0;
        }
        if budget.count < self.config.log_rate_limit {
            budget.count += 1;
            warn!(?key, "value extraction failed; key excluded from index");
        }
    }

    fn apply_insert(&self, state: &mut State<X::Extracted, K>, key: K, extracted: ExtractedValue<X::Extracted>) {
        state.excluded.remove(&key);
        match &extracted {
            ExtractedValue::Scalar(_) => {
                let shared = Arc::new(extracted);
                state.forward.insert(key.clone(), Arc::clone(&shared));
                state.inverse.add_key((*shared).clone(), key);
            }
            ExtractedValue::Collection(list) if !self.extractor.is_multi_valued() => {
                let shared = Self::find_or_share(state, list, self.config.reference_sharing_threshold);
                state.forward.insert(key.clone(), Arc::clone(&shared));
                if let ExtractedValue::Collection(items) = shared.as_ref() {
                    for item in items.clone() {
                        state.inverse.add_key(ExtractedValue::Scalar(item), key.clone());
                    }
                }
            }
            ExtractedValue::Collection(_) => {
                // Multi-valued extractors opt out of splitting: the whole
                // collection is indexed as one atomic value.
                let shared = Arc::new(extracted);
                state.forward.insert(key.clone(), Arc::clone(&shared));
                state.inverse.add_key((*shared).clone(), key);
            }
        }
    }

    fn apply_remove(&self, state: &mut State<X::Extracted, K>, key: &K) {
        if state.excluded.remove(key) {
            return;
        }
        let Some(shared) = state.forward.remove(key) else {
            return;
        };
        match shared.as_ref() {
            ExtractedValue::Collection(list) if !self.extractor.is_multi_valued() => {
                for item in list {
                    state.inverse.remove_key(&ExtractedValue::Scalar(item.clone()), key);
                }
            }
            other => state.inverse.remove_key(other, key),
        }
    }

    /// Finds an existing forward value equal to `list` to share the
    /// allocation with (identity-shared, per §4.F), or builds a new one.
    /// Below the reference-sharing threshold this intersects the inverse
    /// key sets of `list`'s elements; at or above it, the forward map is
    /// scanned directly.
    fn find_or_share(
        state: &State<X::Extracted, K>,
        list: &[X::Extracted],
        threshold: usize,
    ) -> Arc<ExtractedValue<X::Extracted>> {
        if !list.is_empty() {
            let key_sets: Vec<LiteSet<K>> = list
                .iter()
                .filter_map(|item| state.inverse.get(&ExtractedValue::Scalar(item.clone())))
                .collect();

            if key_sets.len() == list.len() {
                let smallest = key_sets.iter().min_by_key(|s| s.len());
                if let Some(smallest) = smallest {
                    if smallest.len() < threshold {
                        'candidates: for candidate_key in smallest.iter() {
                            for set in &key_sets {
                                if !set.contains(candidate_key) {
                                    continue 'candidates;
                                }
                            }
                            if let Some(existing) = state.forward.get(candidate_key) {
                                if collection_eq(existing.as_ref(), list) {
                                    return Arc::clone(existing);
                                }
                            }
                        }
                    } else {
                        for existing in state.forward.values() {
                            if collection_eq(existing.as_ref(), list) {
                                return Arc::clone(existing);
                            }
                        }
                    }
                }
            }
        }
        Arc::new(ExtractedValue::Collection(list.to_vec()))
    }
}

/// §4.F "two indexes are equal iff they have equal comparators, equal
/// extractors, and identical ordering flags". This index never carries a
/// custom comparator — the ordered band always sorts by `TreeMap`'s
/// natural order — so "equal comparators" collapses to "both ordered or
/// both unordered", leaving the extractor and the ordering flag as the
/// only two things to compare.
impl<K, V, X: ValueExtractor<V> + PartialEq> PartialEq for SimpleMapIndex<K, V, X> {
    fn eq(&self, other: &Self) -> bool {
        self.extractor == other.extractor && self.config.ordered == other.config.ordered
    }
}

impl<K, V, X: ValueExtractor<V> + Eq> Eq for SimpleMapIndex<K, V, X> {}

fn collection_eq<T: Eq + Hash>(value: &ExtractedValue<T>, list: &[T]) -> bool {
    match value {
        ExtractedValue::Collection(existing) => {
            existing.len() == list.len()
                && existing.iter().collect::<HashSet<_>>() == list.iter().collect::<HashSet<_>>()
        }
        ExtractedValue::Scalar(_) => false,
    }
}

impl<K, V, X> MapIndex<K, V> for SimpleMapIndex<K, V, X>
where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: 'static,
    X: ValueExtractor<V> + 'static,
{
    fn insert(&self, key: &K, value: &V) -> Result<()> {
        let mut state = self.state.lock();
        match self.extractor.extract(value) {
            Ok(extracted) => self.apply_insert(&mut state, key.clone(), extracted),
            Err(_) => {
                state.excluded.insert(key.clone());
                drop(state);
                self.log_excluded(key);
            }
        }
        Ok(())
    }

    fn update(&self, key: &K, _old_value: &V, new_value: &V) -> Result<()> {
        {
            let mut state = self.state.lock();
            self.apply_remove(&mut state, key);
        }
        self.insert(key, new_value)
    }

    fn remove(&self, key: &K, _old_value: &V) -> Result<()> {
        let mut state = self.state.lock();
        self.apply_remove(&mut state, key);
        Ok(())
    }

    fn is_partial(&self) -> bool {
        !self.state.lock().excluded.is_empty()
    }

    fn is_ordered(&self) -> bool {
        self.config.ordered
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ExtractedValue;

    #[derive(PartialEq, Eq)]
    struct TagExtractor;

    impl ValueExtractor<Vec<&'static str>> for TagExtractor {
        type Extracted = &'static str;

        fn extract(&self, value: &Vec<&'static str>) -> Result<ExtractedValue<&'static str>> {
            Ok(ExtractedValue::Collection(value.clone()))
        }
    }

    struct FailingExtractor;

    impl ValueExtractor<i32> for FailingExtractor {
        type Extracted = i32;

        fn extract(&self, value: &i32) -> Result<ExtractedValue<i32>> {
            if *value < 0 {
                Err(crate::error::CacheError::IllegalArgument("negative".into()))
            } else {
                Ok(ExtractedValue::Scalar(*value))
            }
        }
    }

    #[test]
    fn equality_compares_extractor_and_ordering_flag() {
        let a = SimpleMapIndex::new(TagExtractor);
        let b = SimpleMapIndex::new(TagExtractor);
        assert_eq!(a, b);

        let ordered = SimpleMapIndex::with_config(
            TagExtractor,
            SimpleMapIndexConfig {
                ordered: true,
                ..SimpleMapIndexConfig::default()
            },
        );
        assert_ne!(a, ordered);
    }

    #[test]
    fn s3_collection_splitting_shares_reference() {
        let index = SimpleMapIndex::new(TagExtractor);
        index.insert(&1, &vec!["red", "blue"]).unwrap();
        index.insert(&2, &vec!["red", "blue"]).unwrap();

        let v1 = index.get(&1).unwrap();
        let v2 = index.get(&2).unwrap();
        assert!(Arc::ptr_eq(&v1, &v2), "identical collections should share one forward entry");

        let red_keys = index
            .contents()
            .into_iter()
            .find(|(ev, _)| matches!(ev, ExtractedValue::Scalar(tag) if *tag == "red"))
            .map(|(_, keys)| keys)
            .unwrap();
        assert!(red_keys.contains(&1));
        assert!(red_keys.contains(&2));
    }

    #[test]
    fn s3_distinct_collections_do_not_share() {
        let index = SimpleMapIndex::new(TagExtractor);
        index.insert(&1, &vec!["red", "blue"]).unwrap();
        index.insert(&2, &vec!["red", "green"]).unwrap();

        let v1 = index.get(&1).unwrap();
        let v2 = index.get(&2).unwrap();
        assert!(!Arc::ptr_eq(&v1, &v2));
    }

    #[test]
    fn s4_extraction_failure_excludes_key_and_recovers_on_remove() {
        let index = SimpleMapIndex::new(FailingExtractor);
        index.insert(&1, &10).unwrap();
        index.insert(&2, &-1).unwrap();

        assert!(index.is_partial());
        assert_eq!(index.excluded_keys(), vec![2]);
        assert!(index.get(&2).is_none());
        assert!(index.get(&1).is_some());

        index.remove(&2, &-1).unwrap();
        assert!(!index.excluded_keys().contains(&2));
        assert!(!index.is_partial());
    }

    #[test]
    fn update_moves_key_between_inverse_buckets() {
        let index = SimpleMapIndex::new(FailingExtractor);
        index.insert(&1, &10).unwrap();
        index.update(&1, &10, &20).unwrap();

        let contents = index.contents();
        let ten_keys = contents
            .iter()
            .find(|(ev, _)| matches!(ev, ExtractedValue::Scalar(v) if *v == 10));
        assert!(ten_keys.is_none() || ten_keys.unwrap().1.is_empty());

        let twenty_keys = contents
            .into_iter()
            .find(|(ev, _)| matches!(ev, ExtractedValue::Scalar(v) if *v == 20))
            .map(|(_, keys)| keys)
            .unwrap();
        assert!(twenty_keys.contains(&1));
    }
}
