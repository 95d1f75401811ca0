// `MapListenerSupport` (§4.G): registration across filter-scoped and
// key-scoped domains, the five-state optimization plan, and dispatch.
// Grounded on `original_source/src/coherence/util/MapListenerSupport.cpp`
// (`collectListeners`'s plan switch transcribed directly).

use crate::filter::FilterHandle;
use crate::listener::event::MapEvent;
use crate::listener::listeners::{ListenerHandle, Listeners};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Wraps a [`FilterHandle`] so it can key a `HashMap` by pointer identity —
/// two registrations of "the same" filter object, not two filters that
/// happen to compare equal.
struct FilterKey<K, V>(FilterHandle<K, V>);

impl<K, V> Clone for FilterKey<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> PartialEq for FilterKey<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<K, V> Eq for FilterKey<K, V> {}

impl<K, V> Hash for FilterKey<K, V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const ()).hash(state);
    }
}

/// The cached optimization plan (§4.G "Optimization plan"). Recomputed
/// lazily on the first event after any registration change.
#[derive(Clone)]
enum Plan<K, V> {
    Unknown,
    NoListeners,
    AllListener(ListenerHandle<K, V>),
    KeyListener,
    NoOptimize,
}

/// Registration + dispatch core for map events (§4.G, §5).
///
/// Registration changes (`add_*`/`remove_*`) serialize on an internal
/// lock; event collection snapshots the filter→listeners and key→listeners
/// maps under that same lock, then releases it before dispatching (§5
/// "event collection holds the instance lock only while snapshotting
/// ... dispatch occurs without the lock").
pub struct MapListenerSupport<K, V> {
    filter_listeners: RwLock<HashMap<Option<FilterKey<K, V>>, Listeners<K, V>>>,
    key_listeners: RwLock<HashMap<K, Listeners<K, V>>>,
    plan: RwLock<Plan<K, V>>,
    /// Listener identities with at least one non-lite registration (§4.G:
    /// "a given (scope, listener) tuple is standard iff any registration
    /// of it is non-lite"). Tracked per the spec's contract; this crate's
    /// events always carry full payloads, so lite vs standard only affects
    /// what `is_standard` reports, not dispatch content.
    standard: RwLock<std::collections::HashSet<ListenerId>>,
}

/// An opaque, comparison-only listener identity. Never dereferenced, so
/// `Send`/`Sync` are sound regardless of what the pointee is.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct ListenerId(*const ());
unsafe impl Send for ListenerId {}
unsafe impl Sync for ListenerId {}

impl ListenerId {
    fn of<K, V>(listener: &ListenerHandle<K, V>) -> Self {
        Self(Arc::as_ptr(listener) as *const ())
    }
}

impl<K, V> Default for MapListenerSupport<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MapListenerSupport<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            filter_listeners: RwLock::new(HashMap::new()),
            key_listeners: RwLock::new(HashMap::new()),
            plan: RwLock::new(Plan::Unknown),
            standard: RwLock::new(std::collections::HashSet::new()),
        }
    }

    pub fn add_filter_listener(&self, filter: Option<FilterHandle<K, V>>, listener: ListenerHandle<K, V>, lite: bool) {
        if !lite {
            self.standard.write().insert(ListenerId::of(&listener));
        }
        let key = filter.map(FilterKey);
        let mut map = self.filter_listeners.write();
        map.entry(key).or_insert_with(Listeners::new).add(listener);
        drop(map);
        self.invalidate_plan();
    }

    pub fn remove_filter_listener(&self, filter: Option<&FilterHandle<K, V>>, listener: &ListenerHandle<K, V>) {
        let key = filter.map(|f| FilterKey(Arc::clone(f)));
        let mut map = self.filter_listeners.write();
        if let Some(bucket) = map.get(&key) {
            bucket.remove(listener);
            if bucket.is_empty() {
                map.remove(&key);
            }
        }
        drop(map);
        self.invalidate_plan();
    }

    pub fn add_key_listener(&self, key: K, listener: ListenerHandle<K, V>, lite: bool) {
        if !lite {
            self.standard.write().insert(ListenerId::of(&listener));
        }
        let mut map = self.key_listeners.write();
        map.entry(key).or_insert_with(Listeners::new).add(listener);
        drop(map);
        self.invalidate_plan();
    }

    /// `true` iff `listener` has at least one non-lite registration,
    /// across any scope (§4.G "standard-listeners map").
    pub fn is_standard(&self, listener: &ListenerHandle<K, V>) -> bool {
        self.standard.read().contains(&ListenerId::of(listener))
    }

    pub fn remove_key_listener(&self, key: &K, listener: &ListenerHandle<K, V>) {
        let mut map = self.key_listeners.write();
        if let Some(bucket) = map.get(key) {
            bucket.remove(listener);
            if bucket.is_empty() {
                map.remove(key);
            }
        }
        drop(map);
        self.invalidate_plan();
    }

    fn invalidate_plan(&self) {
        *self.plan.write() = Plan::Unknown;
    }

    fn global_listeners(&self) -> Option<Listeners<K, V>> {
        let map = self.filter_listeners.read();
        let bucket = map.get(&None)?;
        let merged = Listeners::new();
        let (sync, async_) = bucket.snapshot();
        for l in sync.iter().chain(async_.iter()) {
            merged.add(Arc::clone(l));
        }
        Some(merged)
    }

    fn classify(&self) -> Plan<K, V> {
        let filters = self.filter_listeners.read();
        let keys = self.key_listeners.read();

        let only_global = filters.len() <= 1 && filters.keys().all(|k| k.is_none());
        if filters.is_empty() && keys.is_empty() {
            return Plan::NoListeners;
        }
        if only_global && keys.is_empty() {
            if let Some(global) = filters.get(&None) {
                if global.len() == 1 {
                    let (sync, async_) = global.snapshot();
                    let single = sync.iter().chain(async_.iter()).next().cloned();
                    if let Some(single) = single {
                        return Plan::AllListener(single);
                    }
                }
            }
        }
        if filters.is_empty() && !keys.is_empty() {
            let mut sets: Vec<Vec<*const ()>> = Vec::new();
            for bucket in keys.values() {
                let (sync, async_) = bucket.snapshot();
                let mut ids: Vec<*const ()> = sync
                    .iter()
                    .chain(async_.iter())
                    .map(|l| Arc::as_ptr(l) as *const ())
                    .collect();
                ids.sort_unstable();
                sets.push(ids);
            }
            if sets.windows(2).all(|w| w[0] == w[1]) {
                return Plan::KeyListener;
            }
        }
        Plan::NoOptimize
    }

    fn plan(&self) -> Plan<K, V> {
        if let Plan::Unknown = *self.plan.read() {
            let computed = self.classify();
            *self.plan.write() = computed.clone();
            computed
        } else {
            self.plan.read().clone()
        }
    }

    /// Full evaluation algorithm (§4.G): used directly when the cached
    /// plan is `no-optimize`, and as the ground truth the other plans'
    /// fast paths must agree with (§8.6).
    fn collect_full(&self, event: &MapEvent<K, V>, provenance: Option<&[FilterHandle<K, V>]>) -> (Listeners<K, V>, Vec<FilterHandle<K, V>>) {
        let collected = Listeners::new();
        let mut matched_filters = Vec::new();
        let filters = self.filter_listeners.read();

        if let Some(provenance) = provenance {
            for filter in provenance {
                let key = Some(FilterKey(Arc::clone(filter)));
                if let Some(bucket) = filters.get(&key) {
                    let (sync, async_) = bucket.snapshot();
                    for l in sync.iter().chain(async_.iter()) {
                        collected.add(Arc::clone(l));
                    }
                    matched_filters.push(Arc::clone(filter));
                }
            }
            if let Some(global) = filters.get(&None) {
                let (sync, async_) = global.snapshot();
                for l in sync.iter().chain(async_.iter()) {
                    collected.add(Arc::clone(l));
                }
            }
        } else {
            for (key, bucket) in filters.iter() {
                let matches = match key {
                    None => true,
                    Some(FilterKey(filter)) => filter.evaluate(event),
                };
                if !matches {
                    continue;
                }
                let is_non_transformable = matches!(
                    event.transformation_state,
                    crate::listener::event::TransformationState::NonTransformable
                );
                if is_non_transformable {
                    if let Some(FilterKey(filter)) = key {
                        if filter.is_map_event_transformer() {
                            continue;
                        }
                    }
                }
                let (sync, async_) = bucket.snapshot();
                for l in sync.iter().chain(async_.iter()) {
                    collected.add(Arc::clone(l));
                }
                if let Some(FilterKey(filter)) = key {
                    matched_filters.push(Arc::clone(filter));
                }
            }
        }
        drop(filters);

        if !event.is_transformed() {
            let keys = self.key_listeners.read();
            if let Some(bucket) = keys.get(&event.key) {
                let (sync, async_) = bucket.snapshot();
                for l in sync.iter().chain(async_.iter()) {
                    collected.add(Arc::clone(l));
                }
            }
        }

        (collected, matched_filters)
    }

    /// Collects the listeners to deliver `event` to, honoring the cached
    /// optimization plan (§4.G). Returns the listeners plus any filter
    /// provenance recorded during collection, for event enrichment.
    pub fn collect(&self, event: &MapEvent<K, V>, provenance: Option<&[FilterHandle<K, V>]>) -> (Listeners<K, V>, Vec<FilterHandle<K, V>>) {
        match self.plan() {
            Plan::NoListeners => (Listeners::new(), Vec::new()),
            Plan::AllListener(listener) => {
                let collected = Listeners::new();
                collected.add(listener);
                (collected, Vec::new())
            }
            Plan::KeyListener => {
                if event.is_transformed() {
                    return (Listeners::new(), Vec::new());
                }
                let keys = self.key_listeners.read();
                match keys.get(&event.key) {
                    Some(bucket) => {
                        let merged = self.global_listeners().unwrap_or_default();
                        let (sync, async_) = bucket.snapshot();
                        for l in sync.iter().chain(async_.iter()) {
                            merged.add(Arc::clone(l));
                        }
                        (merged, Vec::new())
                    }
                    None => (Listeners::new(), Vec::new()),
                }
            }
            Plan::NoOptimize | Plan::Unknown => self.collect_full(event, provenance),
        }
    }

    /// Collects and dispatches `event` in one step, attaching the matched
    /// filters to the event itself before dispatch when any were recorded
    /// (§4.G "Event enrichment").
    pub fn dispatch(&self, mut event: MapEvent<K, V>, provenance: Option<&[FilterHandle<K, V>]>) {
        let (listeners, matched) = self.collect(&event, provenance);
        if !matched.is_empty() {
            event.filter_provenance = Some(Arc::new(matched));
        }
        listeners.dispatch(&event);
    }

    pub fn is_empty(&self) -> bool {
        self.filter_listeners.read().is_empty() && self.key_listeners.read().is_empty()
    }
}

impl<K, V> std::fmt::Debug for MapListenerSupport<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    /// Snapshots filter- and key-listener counts under their registration
    /// locks before formatting, rather than reading each field separately —
    /// the latter can interleave with a concurrent `add_*`/`remove_*` and
    /// report a filter count and key count that never coexisted.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters = self.filter_listeners.read();
        let keys = self.key_listeners.read();
        let (filter_count, key_count) = (filters.len(), keys.len());
        drop(filters);
        drop(keys);
        f.debug_struct("MapListenerSupport")
            .field("filter_scopes", &filter_count)
            .field("key_scopes", &key_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::listener::event::TransformationState;
    use crate::listener::listeners::MapListener;
    use std::sync::Mutex as StdMutex;

    struct Recorder(StdMutex<Vec<i32>>);
    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self(StdMutex::new(Vec::new())))
        }
        fn seen(&self) -> Vec<i32> {
            self.0.lock().unwrap().clone()
        }
    }
    impl MapListener<i32, i32> for Recorder {
        fn on_event(&self, event: &MapEvent<i32, i32>) {
            self.0.lock().unwrap().push(event.key);
        }
    }

    struct AcceptAll;
    impl Filter<i32, i32> for AcceptAll {
        fn evaluate(&self, _event: &MapEvent<i32, i32>) -> bool {
            true
        }
    }

    #[test]
    fn s5_plan_reclassifies_as_listeners_are_added() {
        let support: MapListenerSupport<i32, i32> = MapListenerSupport::new();
        let l1 = Recorder::new();
        support.add_filter_listener(None, l1.clone() as ListenerHandle<i32, i32>, false);

        let event = MapEvent::inserted(1, 100);
        let (collected, _) = support.collect(&event, None);
        assert_eq!(collected.len(), 1);
        assert!(matches!(support.plan(), Plan::AllListener(_)));

        let l2 = Recorder::new();
        support.add_key_listener(5, l2.clone() as ListenerHandle<i32, i32>, false);
        assert!(matches!(*support.plan.read(), Plan::Unknown));

        let on_key = MapEvent::inserted(5, 1);
        let (collected_on_key, _) = support.collect(&on_key, None);
        assert!(matches!(support.plan(), Plan::NoOptimize));
        assert_eq!(collected_on_key.len(), 2);

        let off_key = MapEvent::inserted(6, 1);
        let (collected_off_key, _) = support.collect(&off_key, None);
        assert_eq!(collected_off_key.len(), 1);
    }

    #[test]
    fn s6_transformed_event_skips_key_listeners() {
        let support: MapListenerSupport<i32, i32> = MapListenerSupport::new();
        let global = Recorder::new();
        let keyed = Recorder::new();
        let filter: FilterHandle<i32, i32> = Arc::new(AcceptAll);
        support.add_filter_listener(Some(Arc::clone(&filter)), global.clone() as ListenerHandle<i32, i32>, false);
        support.add_key_listener(7, keyed.clone() as ListenerHandle<i32, i32>, false);

        let mut event = MapEvent::updated(7, 1, 2);
        event.transformation_state = TransformationState::Transformed;

        support.dispatch(event, Some(std::slice::from_ref(&filter)));

        assert_eq!(global.seen(), vec![7]);
        assert!(keyed.seen().is_empty());
    }

    struct ProvenanceRecorder(StdMutex<Vec<usize>>);
    impl ProvenanceRecorder {
        fn new() -> Arc<Self> {
            Arc::new(Self(StdMutex::new(Vec::new())))
        }
    }
    impl MapListener<i32, i32> for ProvenanceRecorder {
        fn on_event(&self, event: &MapEvent<i32, i32>) {
            let count = event.filter_provenance.as_ref().map_or(0, |f| f.len());
            self.0.lock().unwrap().push(count);
        }
    }

    #[test]
    fn dispatch_attaches_matched_filters_to_the_event() {
        let support: MapListenerSupport<i32, i32> = MapListenerSupport::new();
        let listener = ProvenanceRecorder::new();
        let filter: FilterHandle<i32, i32> = Arc::new(AcceptAll);
        support.add_filter_listener(Some(filter), listener.clone() as ListenerHandle<i32, i32>, false);

        support.dispatch(MapEvent::inserted(1, 100), None);

        assert_eq!(listener.0.lock().unwrap().as_slice(), &[1]);
    }
}
