// Converter-view wrappers (§4.B): lazy, in-place re-typing of a map through
// up/down conversion functions. Grounded on
// `original_source/include/public/coherence/util/ConverterCollections.hpp`.

use super::MapLike;
use std::marker::PhantomData;
use std::sync::Arc;

/// A non-owning view over a [`MapLike`] that re-types keys and values on
/// every access.
///
/// `KF`/`VF` are the "from" (backing) types, `KT`/`VT` the "to" (view)
/// types. `up` converts backing → view, `down` converts view → backing.
/// Neither direction is cached: unlike converter-wrapped events (§9
/// "Converter-event laziness"), a plain view has no per-instance event to
/// cache a conversion against.
pub struct ConverterMap<M, KF, KT, VF, VT> {
    backing: Arc<M>,
    key_up: Arc<dyn Fn(&KF) -> KT + Send + Sync>,
    key_down: Arc<dyn Fn(&KT) -> KF + Send + Sync>,
    value_up: Arc<dyn Fn(VF) -> VT + Send + Sync>,
    value_down: Arc<dyn Fn(VT) -> VF + Send + Sync>,
    _marker: PhantomData<(KF, KT, VF, VT)>,
}

impl<M, KF, KT, VF, VT> ConverterMap<M, KF, KT, VF, VT>
where
    M: MapLike<KF, VF>,
{
    pub fn new(
        backing: Arc<M>,
        key_up: impl Fn(&KF) -> KT + Send + Sync + 'static,
        key_down: impl Fn(&KT) -> KF + Send + Sync + 'static,
        value_up: impl Fn(VF) -> VT + Send + Sync + 'static,
        value_down: impl Fn(VT) -> VF + Send + Sync + 'static,
    ) -> Self {
        Self {
            backing,
            key_up: Arc::new(key_up),
            key_down: Arc::new(key_down),
            value_up: Arc::new(value_up),
            value_down: Arc::new(value_down),
            _marker: PhantomData,
        }
    }

    pub fn get(&self, key: &KT) -> Option<VT> {
        let from_key = (self.key_down)(key);
        self.backing.get(&from_key).map(|v| (self.value_up)(v))
    }

    pub fn put(&self, key: KT, value: VT) -> Option<VT> {
        let from_key = (self.key_down)(&key);
        let from_value = (self.value_down)(value);
        self.backing
            .put(from_key, from_value)
            .map(|v| (self.value_up)(v))
    }

    pub fn remove(&self, key: &KT) -> Option<VT> {
        let from_key = (self.key_down)(key);
        self.backing.remove(&from_key).map(|v| (self.value_up)(v))
    }

    pub fn contains_key(&self, key: &KT) -> bool {
        self.backing.contains_key(&(self.key_down)(key))
    }

    pub fn len(&self) -> usize {
        self.backing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backing.is_empty()
    }

    pub fn keys(&self) -> Vec<KT> {
        self.backing.keys().iter().map(|k| (self.key_up)(k)).collect()
    }
}

/// A single re-typed entry, materialized from a backing `(KF, VF)` pair.
///
/// Unlike [`ConverterMap`], the value conversion result is cached once
/// computed — entries are typically short-lived, handed out of an
/// iteration, and re-converting on every accessor call would defeat the
/// purpose of caching entries at all.
pub struct ConverterEntry<KT, VT> {
    key: KT,
    value: once_cell::unsync::OnceCell<VT>,
    raw_value: Option<Box<dyn Fn() -> VT>>,
}

impl<KT, VT> ConverterEntry<KT, VT> {
    pub fn new(key: KT, produce_value: impl Fn() -> VT + 'static) -> Self {
        Self {
            key,
            value: once_cell::unsync::OnceCell::new(),
            raw_value: Some(Box::new(produce_value)),
        }
    }

    pub fn key(&self) -> &KT {
        &self.key
    }

    pub fn value(&self) -> &VT {
        self.value.get_or_init(|| {
            let f = self.raw_value.as_ref().expect("value producer present");
            f()
        })
    }
}
