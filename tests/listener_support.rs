// Listener optimization-plan classification and transformed-event delivery
// (§8.5, §8.6).

use coherence_rs::listener::{ListenerHandle, MapEvent, MapListener, MapListenerSupport, TransformationState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingListener(AtomicUsize);

impl MapListener<&'static str, i32> for CountingListener {
    fn on_event(&self, _event: &MapEvent<&'static str, i32>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn plan_widens_from_all_listener_to_no_optimize() {
    let support: MapListenerSupport<&'static str, i32> = MapListenerSupport::new();
    let global: Arc<CountingListener> = Arc::new(CountingListener(AtomicUsize::new(0)));
    support.add_filter_listener(None, global.clone() as ListenerHandle<&'static str, i32>, false);

    let (delivered, _) = support.collect(&MapEvent::inserted("a", 1), None);
    assert_eq!(delivered.len(), 1);

    let keyed: Arc<CountingListener> = Arc::new(CountingListener(AtomicUsize::new(0)));
    support.add_key_listener("k", keyed.clone() as ListenerHandle<&'static str, i32>, false);

    let (delivered_on_key, _) = support.collect(&MapEvent::inserted("k", 1), None);
    assert_eq!(delivered_on_key.len(), 2);

    let (delivered_elsewhere, _) = support.collect(&MapEvent::inserted("other", 1), None);
    assert_eq!(delivered_elsewhere.len(), 1);
}

#[test]
fn transformed_events_are_not_delivered_to_key_listeners() {
    let support: MapListenerSupport<&'static str, i32> = MapListenerSupport::new();
    let keyed: Arc<CountingListener> = Arc::new(CountingListener(AtomicUsize::new(0)));
    support.add_key_listener("k", keyed.clone() as ListenerHandle<&'static str, i32>, false);

    let mut event = MapEvent::updated("k", 1, 2);
    event.transformation_state = TransformationState::Transformed;

    let (delivered, _) = support.collect(&event, None);
    assert!(delivered.is_empty());
}
