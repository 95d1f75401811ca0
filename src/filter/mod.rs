// Listener-side filter contract (§4.G, §6 "Key-set filter"). Grounded on
// `original_source/include/public/coherence/util/filter/InKeySetFilter.hpp`.

pub mod in_key_set_filter;

use crate::listener::event::MapEvent;
use std::sync::Arc;

/// Evaluated against an event's (unwrapped) payload to decide whether a
/// filter-scoped listener should see it (§4.G "Filter-scoped").
pub trait Filter<K, V>: Send + Sync {
    fn evaluate(&self, event: &MapEvent<K, V>) -> bool;

    /// Map-event transformers may rewrite an event's transformation state;
    /// the optimization plan must not deliver a non-transformable event to
    /// one of these (§4.G step 4).
    fn is_map_event_transformer(&self) -> bool {
        false
    }
}

pub type FilterHandle<K, V> = Arc<dyn Filter<K, V>>;

pub use in_key_set_filter::InKeySetFilter;
