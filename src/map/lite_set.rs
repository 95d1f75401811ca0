// Size-adaptive set (§4.E). Grounded on
// `original_source/include/public/coherence/util/LiteSet.hpp`'s four
// storage modes (empty, single, small array, delegate).

use std::collections::HashSet;
use std::hash::Hash;

const ARRAY_CAPACITY: usize = 8;

#[derive(Clone)]
enum Storage<T> {
    Empty,
    Single(T),
    Array([Option<T>; ARRAY_CAPACITY], usize),
    Delegate(HashSet<T>),
}

/// A set that starts cheap (no allocation for 0 or 1 elements, a fixed
/// inline array for 2..8) and hands off to a `HashSet` beyond that, per
/// `original_source`'s documented storage-mode band. Transitions shrink
/// back down after `remove`/`retain` when the result fits a smaller mode
/// (§4.E "Transitions are both expansionary ... and contracting").
#[derive(Clone)]
pub struct LiteSet<T> {
    storage: Storage<T>,
}

impl<T: Eq + Hash + Clone> LiteSet<T> {
    pub fn new() -> Self {
        Self {
            storage: Storage::Empty,
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Empty => 0,
            Storage::Single(_) => 1,
            Storage::Array(_, count) => *count,
            Storage::Delegate(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: &T) -> bool {
        match &self.storage {
            Storage::Empty => false,
            Storage::Single(v) => v == value,
            Storage::Array(slots, count) => slots[..*count].iter().any(|s| s.as_ref() == Some(value)),
            Storage::Delegate(set) => set.contains(value),
        }
    }

    /// Returns `true` if `value` was newly inserted.
    pub fn insert(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.storage = match std::mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Empty => Storage::Single(value),
            Storage::Single(existing) => {
                let mut slots: [Option<T>; ARRAY_CAPACITY] = Default::default();
                slots[0] = Some(existing);
                slots[1] = Some(value);
                Storage::Array(slots, 2)
            }
            Storage::Array(mut slots, count) if count < ARRAY_CAPACITY => {
                slots[count] = Some(value);
                Storage::Array(slots, count + 1)
            }
            Storage::Array(slots, count) => {
                let mut set: HashSet<T> = slots.into_iter().take(count).flatten().collect();
                set.insert(value);
                Storage::Delegate(set)
            }
            Storage::Delegate(mut set) => {
                set.insert(value);
                Storage::Delegate(set)
            }
        };
        true
    }

    /// Returns `true` if `value` was present and removed. Shrinks back to
    /// the array (or single/empty) form if the result fits.
    pub fn remove(&mut self, value: &T) -> bool {
        let removed;
        self.storage = match std::mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Empty => {
                removed = false;
                Storage::Empty
            }
            Storage::Single(existing) => {
                if &existing == value {
                    removed = true;
                    Storage::Empty
                } else {
                    removed = false;
                    Storage::Single(existing)
                }
            }
            Storage::Array(mut slots, count) => {
                if let Some(pos) = slots[..count].iter().position(|s| s.as_ref() == Some(value)) {
                    removed = true;
                    slots[pos] = slots[count - 1].take();
                    if count - 1 == 1 {
                        Storage::Single(slots[0].take().expect("one element remains"))
                    } else if count - 1 == 0 {
                        Storage::Empty
                    } else {
                        Storage::Array(slots, count - 1)
                    }
                } else {
                    removed = false;
                    Storage::Array(slots, count)
                }
            }
            Storage::Delegate(mut set) => {
                removed = set.remove(value);
                if set.len() <= ARRAY_CAPACITY {
                    let mut slots: [Option<T>; ARRAY_CAPACITY] = Default::default();
                    let count = set.len();
                    for (slot, item) in slots.iter_mut().zip(set.into_iter()) {
                        *slot = Some(item);
                    }
                    match count {
                        0 => Storage::Empty,
                        1 => Storage::Single(slots[0].take().expect("one element")),
                        _ => Storage::Array(slots, count),
                    }
                } else {
                    Storage::Delegate(set)
                }
            }
        };
        removed
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match &self.storage {
            Storage::Empty => Box::new(std::iter::empty()),
            Storage::Single(v) => Box::new(std::iter::once(v)),
            Storage::Array(slots, count) => Box::new(slots[..*count].iter().filter_map(|s| s.as_ref())),
            Storage::Delegate(set) => Box::new(set.iter()),
        }
    }
}

impl<T: Eq + Hash + Clone> Default for LiteSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> PartialEq for LiteSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for LiteSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_transitions_follow_size() {
        let mut set: LiteSet<i32> = LiteSet::new();
        assert_eq!(set.len(), 0);
        set.insert(1);
        assert_eq!(set.len(), 1);
        for v in 2..=8 {
            set.insert(v);
        }
        assert_eq!(set.len(), 8);
        set.insert(9);
        assert_eq!(set.len(), 9);
        for v in 1..=9 {
            assert!(set.contains(&v));
        }
    }

    #[test]
    fn shrinks_back_down_after_remove() {
        let mut set: LiteSet<i32> = (1..=9).collect();
        assert_eq!(set.len(), 9);
        set.remove(&9);
        assert_eq!(set.len(), 8);
        for v in (2..=8).rev() {
            set.remove(&v);
        }
        assert_eq!(set.len(), 1);
        assert!(set.contains(&1));
        set.remove(&1);
        assert!(set.is_empty());
    }

    #[test]
    fn equality_is_unordered_set_semantics() {
        let a: LiteSet<i32> = [1, 2, 3].into_iter().collect();
        let b: LiteSet<i32> = [3, 2, 1].into_iter().collect();
        assert_eq!(a, b);
    }
}
