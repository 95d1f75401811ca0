// Semantic container interfaces shared by every component (§4.A).
//
// These traits stand in for the Java-ish `Iterator`/`Collection`/`Map`/
// `Observable`/`Invocable` contracts the rest of the crate is built on top
// of. They carry no storage of their own.

pub mod converter;
pub mod immutable;

use crate::error::Result;
use crate::listener::event::MapEvent;
use crate::listener::listeners::ListenerHandle;

/// A read-only cursor over a sequence of items.
///
/// Mirrors Java's `Iterator`, not Rust's `std::iter::Iterator`: `has_next`
/// is idempotent and safe to call repeatedly without advancing state.
pub trait CacheIterator {
    type Item;

    fn has_next(&self) -> bool;
    fn next(&mut self) -> Option<Self::Item>;
}

/// A [`CacheIterator`] that can also remove the element it last yielded.
///
/// Named after the original's "iterator doubling as remover" idiom (§9
/// "Iterator-as-muterator"): most views hand out a `Muterator` rather than
/// splitting read-only and mutating cursor types.
pub trait Muterator: CacheIterator {
    /// Remove the element last returned by `next()`.
    ///
    /// # Errors
    /// Returns [`crate::CacheError::IllegalState`] if called before the
    /// first `next()` or twice in a row without an intervening `next()`.
    fn remove_current(&mut self) -> Result<()>;
}

/// A map that can be observed for changes.
///
/// Listener registration is key-scoped, filter-scoped, or global (a `None`
/// filter). Every registration carries a `lite` flag distinguishing
/// notification-only listeners from ones that need old/new values
/// materialized (§4.G).
pub trait ObservableMap<K, V> {
    fn add_key_listener(&self, key: K, listener: ListenerHandle<K, V>, lite: bool) -> Result<()>;
    fn remove_key_listener(&self, key: &K, listener: &ListenerHandle<K, V>) -> Result<()>;

    fn add_filter_listener(
        &self,
        filter: Option<crate::filter::FilterHandle<K, V>>,
        listener: ListenerHandle<K, V>,
        lite: bool,
    ) -> Result<()>;
    fn remove_filter_listener(
        &self,
        filter: Option<&crate::filter::FilterHandle<K, V>>,
        listener: &ListenerHandle<K, V>,
    ) -> Result<()>;

    /// Register `listener` with no filter and no key: receives every event.
    fn add_listener(&self, listener: ListenerHandle<K, V>, lite: bool) -> Result<()> {
        self.add_filter_listener(None, listener, lite)
    }
    fn remove_listener(&self, listener: &ListenerHandle<K, V>) -> Result<()> {
        self.remove_filter_listener(None, listener)
    }
}

/// An entry-processor-invokable map (§6).
pub trait Invocable<K, V, R> {
    fn invoke(&self, key: &K, processor: &dyn crate::processor::EntryProcessor<K, V, R>) -> Result<R>;
    fn invoke_all(
        &self,
        keys: &[K],
        processor: &dyn crate::processor::EntryProcessor<K, V, R>,
    ) -> Result<std::collections::HashMap<K, R>>
    where
        K: std::hash::Hash + Eq + Clone;
}

/// Minimal map-like capability converter views are built against (§4.B).
///
/// Both `SafeHashMap` and `TreeMap` implement this; a `ConverterMap` wraps
/// any `MapLike` rather than depending on a concrete map type.
pub trait MapLike<K, V> {
    fn get(&self, key: &K) -> Option<V>;
    fn put(&self, key: K, value: V) -> Option<V>;
    fn remove(&self, key: &K) -> Option<V>;
    fn contains_key(&self, key: &K) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn keys(&self) -> Vec<K>;
}

/// Re-export used by listener dispatch to name the event type without a
/// circular module path.
pub type Event<K, V> = MapEvent<K, V>;
