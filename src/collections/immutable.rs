// Process-wide immutable singleton collections (§4.H, §9 "Singleton
// immutable collections"). Grounded on
// `original_source/src/coherence/util/Collections.cpp`.

use crate::error::{CacheError, Result};
use std::collections::HashSet;
use std::hash::Hash;

/// An immutable set backed by either nothing, one element, or an owned
/// `HashSet`. Every mutator returns [`CacheError::UnsupportedOperation`].
#[derive(Debug, Clone)]
pub struct ImmutableSet<T> {
    inner: ImmutableSetInner<T>,
}

#[derive(Debug, Clone)]
enum ImmutableSetInner<T> {
    Empty,
    Singleton(T),
    Owned(HashSet<T>),
}

impl<T: Eq + Hash + Clone> ImmutableSet<T> {
    pub fn empty() -> Self {
        Self {
            inner: ImmutableSetInner::Empty,
        }
    }

    pub fn singleton(value: T) -> Self {
        Self {
            inner: ImmutableSetInner::Singleton(value),
        }
    }

    pub fn of(values: HashSet<T>) -> Self {
        Self {
            inner: ImmutableSetInner::Owned(values),
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        match &self.inner {
            ImmutableSetInner::Empty => false,
            ImmutableSetInner::Singleton(v) => v == value,
            ImmutableSetInner::Owned(set) => set.contains(value),
        }
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            ImmutableSetInner::Empty => 0,
            ImmutableSetInner::Singleton(_) => 1,
            ImmutableSetInner::Owned(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match &self.inner {
            ImmutableSetInner::Empty => Box::new(std::iter::empty()),
            ImmutableSetInner::Singleton(v) => Box::new(std::iter::once(v)),
            ImmutableSetInner::Owned(set) => Box::new(set.iter()),
        }
    }

    /// Always fails: this set is read-only (§7 Unsupported operation).
    pub fn add(&mut self, _value: T) -> Result<bool> {
        Err(CacheError::UnsupportedOperation(
            "add on an immutable set".into(),
        ))
    }

    pub fn remove(&mut self, _value: &T) -> Result<bool> {
        Err(CacheError::UnsupportedOperation(
            "remove on an immutable set".into(),
        ))
    }

    pub fn clear(&mut self) -> Result<()> {
        Err(CacheError::UnsupportedOperation(
            "clear on an immutable set".into(),
        ))
    }
}

/// An immutable map holding zero or one entry. Mutators fail the same way
/// as [`ImmutableSet`]'s.
#[derive(Debug, Clone)]
pub struct ImmutableMap<K, V> {
    entry: Option<(K, V)>,
}

impl<K: Eq + Clone, V: Clone> ImmutableMap<K, V> {
    pub fn empty() -> Self {
        Self { entry: None }
    }

    pub fn singleton(key: K, value: V) -> Self {
        Self {
            entry: Some((key, value)),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entry
            .as_ref()
            .and_then(|(k, v)| if k == key { Some(v) } else { None })
    }

    pub fn len(&self) -> usize {
        self.entry.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn put(&mut self, _key: K, _value: V) -> Result<Option<V>> {
        Err(CacheError::UnsupportedOperation(
            "put on an immutable map".into(),
        ))
    }

    pub fn remove(&mut self, _key: &K) -> Result<Option<V>> {
        Err(CacheError::UnsupportedOperation(
            "remove on an immutable map".into(),
        ))
    }
}

/// The empty set (§9 "process-wide constants with static lifetime").
///
/// `ImmutableSet::Empty` carries no data, so there is nothing to share
/// across calls beyond what the tag itself already is. A `once_cell::sync::Lazy`
/// static can't stand behind this constructor because it is generic over
/// `T`: a `Lazy<ImmutableSet<T>>` would need one instance per
/// monomorphization, which `once_cell` has no way to express as a single
/// item — so this builds the zero-sized tag fresh on every call instead.
pub fn empty_set<T: Eq + Hash + Clone>() -> ImmutableSet<T> {
    ImmutableSet::empty()
}

pub fn singleton_set<T: Eq + Hash + Clone>(value: T) -> ImmutableSet<T> {
    ImmutableSet::singleton(value)
}

/// The empty map (§4.H, §9).
pub fn empty_map<K: Eq + Clone, V: Clone>() -> ImmutableMap<K, V> {
    ImmutableMap::empty()
}

pub fn singleton_map<K: Eq + Clone, V: Clone>(key: K, value: V) -> ImmutableMap<K, V> {
    ImmutableMap::singleton(key, value)
}
