// §6 "Key-set filter": delegates to an inner filter, restricted to a fixed
// key set, with idempotent late conversion of that set into internal form.
// Grounded on `original_source/include/public/coherence/util/filter/
// InKeySetFilter.hpp`.

use crate::filter::{Filter, FilterHandle};
use crate::listener::event::MapEvent;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

/// `InKeySetFilter(filter, keys)` (§6). The partitioned-cache runtime calls
/// `ensure_converted` exactly once, when this filter is the outermost query
/// filter, to rewrite `keys` into whatever internal key representation the
/// runtime uses; further calls are no-ops (§6 "idempotent, late conversion").
pub struct InKeySetFilter<K, V> {
    inner: Option<FilterHandle<K, V>>,
    keys: Mutex<HashSet<K>>,
    converted: AtomicBool,
}

impl<K: Eq + Hash + Clone, V> InKeySetFilter<K, V> {
    pub fn new(inner: Option<FilterHandle<K, V>>, keys: HashSet<K>) -> Self {
        Self {
            inner,
            keys: Mutex::new(keys),
            converted: AtomicBool::new(false),
        }
    }

    /// Rewrites the key set in place using `converter`. A no-op on every
    /// call after the first.
    pub fn ensure_converted<C>(&self, converter: C)
    where
        C: Fn(&K) -> K,
    {
        if self.converted.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut guard = self.keys.lock();
        let rewritten = guard.iter().map(&converter).collect();
        *guard = rewritten;
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.keys.lock().contains(key)
    }
}

impl<K: Eq + Hash + Clone + Send + Sync, V: Send + Sync> Filter<K, V> for InKeySetFilter<K, V> {
    fn evaluate(&self, event: &MapEvent<K, V>) -> bool {
        self.contains_key(&event.key) && self.inner.as_ref().map_or(true, |f| f.evaluate(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_true_only_for_member_keys() {
        let keys: HashSet<i32> = [1, 2, 3].into_iter().collect();
        let filter = InKeySetFilter::<i32, &'static str>::new(None, keys);

        let hit = MapEvent::inserted(2, "v");
        let miss = MapEvent::inserted(9, "v");
        assert!(filter.evaluate(&hit));
        assert!(!filter.evaluate(&miss));
    }

    #[test]
    fn ensure_converted_is_idempotent() {
        let keys: HashSet<i32> = [1, 2].into_iter().collect();
        let filter = InKeySetFilter::<i32, &'static str>::new(None, keys);
        filter.ensure_converted(|k| k * 10);
        filter.ensure_converted(|k| k * 10);
        assert!(filter.contains_key(&10));
        assert!(filter.contains_key(&20));
        assert!(!filter.contains_key(&100));
    }
}
