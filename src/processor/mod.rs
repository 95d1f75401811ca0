// §6 "Entry processor interface": `process`/`processAll` over a map's
// entries. Grounded on
// `original_source/include/public/coherence/util/processor/
// ConditionalPutAll.hpp` and `InvocableMap.hpp`.

pub mod conditional_put_all;

use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;

/// A live, mutable view of one backing-map entry, passed to an
/// [`EntryProcessor`]. Mirrors `InvocableMap.Entry`: `get`/`set`/`remove`
/// read and stage the entry's value; the invoking map is responsible for
/// applying whatever the processor leaves behind once `process` returns.
pub struct Entry<'a, K, V> {
    key: &'a K,
    value: &'a mut Option<V>,
}

impl<'a, K, V> Entry<'a, K, V> {
    pub fn new(key: &'a K, value: &'a mut Option<V>) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &K {
        self.key
    }

    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn set(&mut self, value: V) {
        *self.value = Some(value);
    }

    pub fn remove(&mut self) {
        *self.value = None;
    }
}

/// Invoked on one entry (`process`) or a key collection (`process_all`),
/// returning an arbitrary result per key (§6).
pub trait EntryProcessor<K, V, R>: Send + Sync {
    fn process(&self, entry: &mut Entry<K, V>) -> Result<R>;

    fn process_all(&self, entries: &mut [Entry<K, V>]) -> Result<HashMap<K, R>>
    where
        K: Eq + Hash + Clone,
    {
        let mut results = HashMap::with_capacity(entries.len());
        for entry in entries.iter_mut() {
            let key = entry.key().clone();
            let result = self.process(entry)?;
            results.insert(key, result);
        }
        Ok(results)
    }
}

pub use conditional_put_all::ConditionalPutAll;
