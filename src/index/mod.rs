// Inverted-index engine (§4.F): `MapIndex` trait plus the concrete
// `SimpleMapIndex` engine. Grounded on `harborgrid-justin-rusty-db`'s
// `index/hash_index.rs` for the `Arc<RwLock<_>>`-per-index texture;
// algorithm transcribed from
// `original_source/src/coherence/util/SimpleMapIndex.cpp`.

pub mod simple_map_index;

use crate::error::Result;
use std::any::Any;

/// Extracts the indexed value from a cache entry's value (§4.F, §6
/// "Index descriptor"). Implementations that may legitimately return a
/// collection/array of indexable values (rather than one atomic scalar)
/// must report `true` from `is_multi_valued`, which disables collection-
/// splitting for their extraction (§4.F).
pub trait ValueExtractor<V>: Send + Sync {
    type Extracted: Clone + Eq + std::hash::Hash + Send + Sync;

    /// Returns `Err` if extraction fails for this value; the caller (the
    /// index) is responsible for excluding the offending key (§7 "Indexing
    /// failure").
    fn extract(&self, value: &V) -> Result<ExtractedValue<Self::Extracted>>;

    fn is_multi_valued(&self) -> bool {
        false
    }
}

/// The shape an extraction can take: one value, or a collection of values
/// to be split across the inverse map under a single forward key (§4.F
/// "Collection-splitting").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtractedValue<T> {
    Scalar(T),
    Collection(Vec<T>),
}

/// An index over a backing map, built from a [`ValueExtractor`] (§4.F).
pub trait MapIndex<K, V>: Send + Sync {
    fn insert(&self, key: &K, value: &V) -> Result<()>;
    fn update(&self, key: &K, old_value: &V, new_value: &V) -> Result<()>;
    fn remove(&self, key: &K, old_value: &V) -> Result<()>;
    fn is_partial(&self) -> bool;
    fn is_ordered(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}
