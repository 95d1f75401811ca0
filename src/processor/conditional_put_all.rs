// §6 "A representative processor, ConditionalPutAll". Grounded on
// `original_source/src/coherence/util/processor/ConditionalPutAll.cpp`.

use crate::error::Result;
use crate::filter::FilterHandle;
use crate::listener::event::MapEvent;
use crate::processor::{Entry, EntryProcessor};
use std::collections::HashMap;
use std::hash::Hash;

/// Applies `entries[key]` to the entry at `key` iff `filter` evaluates a
/// probe event built from the entry's current value. Wire-serialized with
/// two POF slots in the original: `0 = filter`, `1 = map-of-entries-to-
/// apply`. This crate has no wire format of its own (out of scope, §4
/// Non-goals), but the slot contract is still part of the processor's
/// public shape, so [`Self::filter_pof_slot`]/[`Self::entries_pof_slot`]
/// expose it rather than leaving it as a comment only a POF implementer
/// would ever read.
pub struct ConditionalPutAll<K, V> {
    filter: FilterHandle<K, V>,
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> ConditionalPutAll<K, V> {
    pub fn new(filter: FilterHandle<K, V>, entries: HashMap<K, V>) -> Self {
        Self { filter, entries }
    }

    /// POF slot index of the `filter` field.
    pub const fn filter_pof_slot(&self) -> u32 {
        0
    }

    /// POF slot index of the `entries` field.
    pub const fn entries_pof_slot(&self) -> u32 {
        1
    }
}

impl<K, V> EntryProcessor<K, V, Option<V>> for ConditionalPutAll<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn process(&self, entry: &mut Entry<K, V>) -> Result<Option<V>> {
        let Some(new_value) = self.entries.get(entry.key()) else {
            return Ok(entry.get().cloned());
        };

        let probe = match entry.get() {
            Some(current) => MapEvent::updated(entry.key().clone(), current.clone(), current.clone()),
            None => MapEvent::inserted(entry.key().clone(), new_value.clone()),
        };

        if self.filter.evaluate(&probe) {
            let previous = entry.get().cloned();
            entry.set(new_value.clone());
            Ok(previous)
        } else {
            Ok(entry.get().cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use std::sync::Arc;

    struct AlwaysTrue;
    impl Filter<i32, i32> for AlwaysTrue {
        fn evaluate(&self, _event: &MapEvent<i32, i32>) -> bool {
            true
        }
    }

    struct NeverMatches;
    impl Filter<i32, i32> for NeverMatches {
        fn evaluate(&self, _event: &MapEvent<i32, i32>) -> bool {
            false
        }
    }

    #[test]
    fn pof_slots_match_the_wire_layout() {
        let entries: HashMap<i32, i32> = [(1, 100)].into_iter().collect();
        let processor = ConditionalPutAll::new(Arc::new(AlwaysTrue) as FilterHandle<i32, i32>, entries);
        assert_eq!(processor.filter_pof_slot(), 0);
        assert_eq!(processor.entries_pof_slot(), 1);
    }

    #[test]
    fn applies_when_filter_matches() {
        let entries: HashMap<i32, i32> = [(1, 100)].into_iter().collect();
        let processor = ConditionalPutAll::new(Arc::new(AlwaysTrue) as FilterHandle<i32, i32>, entries);

        let mut slot = Some(5);
        let mut entry = Entry::new(&1, &mut slot);
        let previous = processor.process(&mut entry).unwrap();
        assert_eq!(previous, Some(5));
        assert_eq!(slot, Some(100));
    }

    #[test]
    fn leaves_entry_untouched_when_filter_rejects() {
        let entries: HashMap<i32, i32> = [(1, 100)].into_iter().collect();
        let processor = ConditionalPutAll::new(Arc::new(NeverMatches) as FilterHandle<i32, i32>, entries);

        let mut slot = Some(5);
        let mut entry = Entry::new(&1, &mut slot);
        processor.process(&mut entry).unwrap();
        assert_eq!(slot, Some(5));
    }
}
