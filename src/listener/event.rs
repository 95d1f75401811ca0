// Map-event payload (§6 "Map event payload"). Grounded on
// `original_source/include/public/coherence/util/MapEvent.hpp` for the
// id/synthetic/transformation-state/priming shape, and
// `ConverterCollections.hpp` for the lazily-converted wrapper.

use crate::filter::FilterHandle;
use once_cell::unsync::OnceCell;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapEventKind {
    Inserted,
    Updated,
    Deleted,
}

/// Whether an event may still be rewritten by a map-event transformer
/// before dispatch, or already has been (§4.G "full evaluation algorithm"
/// step 3-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformationState {
    Transformable,
    NonTransformable,
    Transformed,
}

/// A single map mutation, as delivered to listeners (§6). `filter_provenance`
/// is the filter-event subtype folded into the base payload rather than a
/// separate wrapper type (§4.G "Event enrichment"): it is `None` until
/// [`MapListenerSupport::dispatch`](crate::listener::support::MapListenerSupport::dispatch)
/// attaches the filters whose match caused this listener set to be
/// collected, and absent listeners simply see it as a normal event.
#[derive(Debug, Clone)]
pub struct MapEvent<K, V> {
    pub kind: MapEventKind,
    pub key: K,
    pub old_value: Option<V>,
    pub new_value: Option<V>,
    pub synthetic: bool,
    pub transformation_state: TransformationState,
    pub priming: bool,
    pub filter_provenance: Option<Arc<Vec<FilterHandle<K, V>>>>,
}

impl<K, V> MapEvent<K, V> {
    pub fn inserted(key: K, new_value: V) -> Self {
        Self {
            kind: MapEventKind::Inserted,
            key,
            old_value: None,
            new_value: Some(new_value),
            synthetic: false,
            transformation_state: TransformationState::Transformable,
            priming: false,
            filter_provenance: None,
        }
    }

    pub fn updated(key: K, old_value: V, new_value: V) -> Self {
        Self {
            kind: MapEventKind::Updated,
            key,
            old_value: Some(old_value),
            new_value: Some(new_value),
            synthetic: false,
            transformation_state: TransformationState::Transformable,
            priming: false,
            filter_provenance: None,
        }
    }

    pub fn deleted(key: K, old_value: V) -> Self {
        Self {
            kind: MapEventKind::Deleted,
            key,
            old_value: Some(old_value),
            new_value: None,
            synthetic: false,
            transformation_state: TransformationState::Transformable,
            priming: false,
            filter_provenance: None,
        }
    }

    pub fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn with_priming(mut self, priming: bool) -> Self {
        self.priming = priming;
        self
    }

    pub fn with_transformation_state(mut self, state: TransformationState) -> Self {
        self.transformation_state = state;
        self
    }

    pub fn with_filter_provenance(mut self, filters: Vec<FilterHandle<K, V>>) -> Self {
        self.filter_provenance = Some(Arc::new(filters));
        self
    }

    pub fn is_transformed(&self) -> bool {
        self.transformation_state == TransformationState::Transformed
    }
}

/// A converter-wrapped event (§4.G "Converter-wrapped events"): re-types
/// key/old-value/new-value through up-converters lazily, caching each
/// converted value so a converter is invoked at most once per accessor
/// per event instance (§9 "Converter-event laziness").
pub struct ConverterMapEvent<K, V, KT, VT> {
    source: MapEvent<K, V>,
    key_up: Arc<dyn Fn(&K) -> KT + Send + Sync>,
    value_up: Arc<dyn Fn(&V) -> VT + Send + Sync>,
    key_cache: OnceCell<KT>,
    old_value_cache: OnceCell<Option<VT>>,
    new_value_cache: OnceCell<Option<VT>>,
}

impl<K, V, KT, VT> ConverterMapEvent<K, V, KT, VT> {
    pub fn new(
        source: MapEvent<K, V>,
        key_up: Arc<dyn Fn(&K) -> KT + Send + Sync>,
        value_up: Arc<dyn Fn(&V) -> VT + Send + Sync>,
    ) -> Self {
        Self {
            source,
            key_up,
            value_up,
            key_cache: OnceCell::new(),
            old_value_cache: OnceCell::new(),
            new_value_cache: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> MapEventKind {
        self.source.kind
    }

    pub fn key(&self) -> &KT {
        self.key_cache.get_or_init(|| (self.key_up)(&self.source.key))
    }

    pub fn old_value(&self) -> Option<&VT> {
        self.old_value_cache
            .get_or_init(|| self.source.old_value.as_ref().map(|v| (self.value_up)(v)))
            .as_ref()
    }

    pub fn new_value(&self) -> Option<&VT> {
        self.new_value_cache
            .get_or_init(|| self.source.new_value.as_ref().map(|v| (self.value_up)(v)))
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn converter_event_caches_converted_values() {
        let calls = Arc::new(Cell::new(0));
        let calls_for_closure = Arc::clone(&calls);
        let event = MapEvent::updated(1, "old".to_string(), "new".to_string());
        let converted = ConverterMapEvent::new(
            event,
            Arc::new(|k: &i32| *k),
            Arc::new(move |v: &String| {
                calls_for_closure.set(calls_for_closure.get() + 1);
                v.to_uppercase()
            }),
        );

        assert_eq!(converted.new_value(), Some(&"NEW".to_string()));
        assert_eq!(converted.new_value(), Some(&"NEW".to_string()));
        assert_eq!(converted.old_value(), Some(&"OLD".to_string()));
        assert_eq!(calls.get(), 2, "each accessor converts at most once");
    }
}
