// Event dispatch core (§4.G): event payloads, the `Listeners` collector,
// and `MapListenerSupport`'s registration + optimization-plan + dispatch
// logic.

pub mod event;
pub mod listeners;
pub mod support;

pub use event::{ConverterMapEvent, MapEvent, MapEventKind, TransformationState};
pub use listeners::{ListenerHandle, Listeners, MapListener};
pub use support::MapListenerSupport;
