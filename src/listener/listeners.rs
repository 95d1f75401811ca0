// The `Listeners` collector (§4.A, §4.G "Listeners container"): two
// ordered, duplicate-free, copy-on-write sequences plus an optional
// filter-provenance array. Grounded on
// `original_source/src/coherence/util/Listeners.cpp`.

use crate::listener::event::MapEvent;
use parking_lot::Mutex;
use std::sync::Arc;

/// A registered map listener. Mirrors the teacher's dyn-dispatch-over-a-
/// capability-set convention (§9 "Dynamic dispatch").
pub trait MapListener<K, V>: Send + Sync {
    fn on_event(&self, event: &MapEvent<K, V>);

    /// Synchronous listeners are invoked on the dispatching thread, in
    /// registration order, ahead of any asynchronous delivery (§4.G
    /// "Dispatch ordering").
    fn is_synchronous(&self) -> bool {
        false
    }

    /// A synthetic "priming" event is delivered on initial subscription
    /// when set (§4.G "Priming listeners").
    fn wants_priming(&self) -> bool {
        false
    }
}

pub type ListenerHandle<K, V> = Arc<dyn MapListener<K, V>>;

fn ptr_eq<K, V>(a: &ListenerHandle<K, V>, b: &ListenerHandle<K, V>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Two ordered, duplicate-free sequences (sync/async), grouped per
/// registration scope (a filter, a key, or the union of both). Every
/// mutation allocates a fresh `Vec` and swaps it in under lock, so a
/// dispatcher holding a prior snapshot via [`Listeners::snapshot`] never
/// observes a torn read (§5 "Listener sequences are copy-on-write").
pub struct Listeners<K, V> {
    sync_listeners: Mutex<Arc<Vec<ListenerHandle<K, V>>>>,
    async_listeners: Mutex<Arc<Vec<ListenerHandle<K, V>>>>,
}

impl<K, V> Default for Listeners<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Listeners<K, V> {
    pub fn new() -> Self {
        Self {
            sync_listeners: Mutex::new(Arc::new(Vec::new())),
            async_listeners: Mutex::new(Arc::new(Vec::new())),
        }
    }

    /// Adds `listener` to the sequence matching its synchronicity.
    /// Returns `false` if it was already present (duplicates are
    /// prohibited within a sequence, §4.G "Listeners container").
    pub fn add(&self, listener: ListenerHandle<K, V>) -> bool {
        let target = if listener.is_synchronous() {
            &self.sync_listeners
        } else {
            &self.async_listeners
        };
        let mut guard = target.lock();
        if guard.iter().any(|l| ptr_eq(l, &listener)) {
            return false;
        }
        let mut next = (**guard).clone();
        next.push(listener);
        *guard = Arc::new(next);
        true
    }

    pub fn remove(&self, listener: &ListenerHandle<K, V>) -> bool {
        let mut removed = false;
        for target in [&self.sync_listeners, &self.async_listeners] {
            let mut guard = target.lock();
            if guard.iter().any(|l| ptr_eq(l, listener)) {
                let next: Vec<_> = guard.iter().filter(|l| !ptr_eq(l, listener)).cloned().collect();
                *guard = Arc::new(next);
                removed = true;
            }
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.sync_listeners.lock().is_empty() && self.async_listeners.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.sync_listeners.lock().len() + self.async_listeners.lock().len()
    }

    /// A stable, point-in-time view of both sequences.
    pub fn snapshot(&self) -> (Arc<Vec<ListenerHandle<K, V>>>, Arc<Vec<ListenerHandle<K, V>>>) {
        (Arc::clone(&self.sync_listeners.lock()), Arc::clone(&self.async_listeners.lock()))
    }

    /// Merges `other`'s listeners into a fresh collector, preserving
    /// registration order within each sequence (union for the listener
    /// union property, §8.5).
    pub fn union(&self, other: &Listeners<K, V>) -> Listeners<K, V> {
        let merged = Listeners::new();
        let (sync_a, async_a) = self.snapshot();
        let (sync_b, async_b) = other.snapshot();
        for listener in sync_a.iter().chain(sync_b.iter()).chain(async_a.iter()).chain(async_b.iter()) {
            merged.add(Arc::clone(listener));
        }
        merged
    }

    /// Invokes synchronous listeners on the calling thread in registration
    /// order, then asynchronous listeners the same way (§4.G "Dispatch
    /// ordering": no scheduling facility is assumed at this layer, so
    /// asynchronous dispatch here is direct rather than deferred). A
    /// synchronous listener that panics aborts the dispatch, matching the
    /// "fatal to the current dispatch" contract; this crate does not catch
    /// unwinds.
    pub fn dispatch(&self, event: &MapEvent<K, V>) {
        let (sync, async_) = self.snapshot();
        for listener in sync.iter() {
            listener.on_event(event);
        }
        for listener in async_.iter() {
            listener.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize, bool);

    impl MapListener<i32, i32> for Counter {
        fn on_event(&self, _event: &MapEvent<i32, i32>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn is_synchronous(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn add_is_idempotent_per_sequence() {
        let listeners: Listeners<i32, i32> = Listeners::new();
        let l: ListenerHandle<i32, i32> = Arc::new(Counter(AtomicUsize::new(0), false));
        assert!(listeners.add(Arc::clone(&l)));
        assert!(!listeners.add(Arc::clone(&l)));
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn dispatch_invokes_sync_then_async_in_registration_order() {
        let listeners: Listeners<i32, i32> = Listeners::new();
        let sync: Arc<Counter> = Arc::new(Counter(AtomicUsize::new(0), true));
        let async_: Arc<Counter> = Arc::new(Counter(AtomicUsize::new(0), false));
        listeners.add(sync.clone() as ListenerHandle<i32, i32>);
        listeners.add(async_.clone() as ListenerHandle<i32, i32>);

        listeners.dispatch(&MapEvent::inserted(1, 100));
        assert_eq!(sync.0.load(Ordering::SeqCst), 1);
        assert_eq!(async_.0.load(Ordering::SeqCst), 1);
    }
}
