#![forbid(unsafe_code)]

//! Value derived from named global events.
//!
//! [`EventListener`] is the shared shape behind window size, connectivity and
//! pointer tracking: an initial value read when the hook starts, a listener
//! per event name that maps events to new values, and removal of every
//! listener on teardown.

use std::fmt;
use std::rc::Rc;

use tether_runtime::{
    Deregister, EventTarget, HookError, HostEvent, Notifier, RegistrationError, ResourceHandle,
    Watch,
};

type MapEvent<T> = Rc<dyn Fn(&HostEvent) -> Option<T>>;

/// Latest value produced by `map` from events named in `names`.
pub struct EventListener<T: 'static> {
    handle: ResourceHandle<T>,
}

impl<T: fmt::Debug + 'static> fmt::Debug for EventListener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("handle", &self.handle)
            .finish()
    }
}

impl<T: Clone + 'static> EventListener<T> {
    /// Listen on `events` for each name in `names`. Events for which `map`
    /// returns `None` leave the value alone.
    pub fn new(
        events: &EventTarget,
        names: &[&str],
        initial: T,
        map: impl Fn(&HostEvent) -> Option<T> + 'static,
    ) -> Result<Self, HookError> {
        let handle = ResourceHandle::named("event_listener", initial);
        let events = events.clone();
        let names: Vec<String> = names.iter().map(|n| (*n).to_owned()).collect();
        let map: MapEvent<T> = Rc::new(map);
        handle.activate(
            move |notify: Notifier<T>| -> Result<Deregister, RegistrationError> {
                let ids: Vec<_> = names
                    .iter()
                    .map(|name| {
                        let (notify, map) = (notify.clone(), Rc::clone(&map));
                        events.add_listener(name, move |event| {
                            if let Some(value) = map(event) {
                                notify.notify(value);
                            }
                        })
                    })
                    .collect();
                Ok(Deregister::new(move || {
                    for id in ids {
                        events.remove_listener(id);
                    }
                }))
            },
        )?;
        Ok(Self { handle })
    }

    /// Latest mapped value, or the initial one.
    #[must_use]
    pub fn value(&self) -> T {
        self.handle.current_value()
    }

    /// Events applied since the hook started.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.handle.version()
    }

    /// Observe mapped values.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        self.handle.watch(callback)
    }

    /// Whether the listeners are still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Remove the listeners. Idempotent.
    pub fn deactivate(&self) {
        self.handle.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn custom(name: &str, detail: serde_json::Value) -> HostEvent {
        HostEvent::Custom {
            name: name.into(),
            detail,
        }
    }

    #[test]
    fn maps_matching_events() {
        let events = EventTarget::new();
        let hook = EventListener::new(&events, &["score"], 0i64, |e| match e {
            HostEvent::Custom { detail, .. } => detail.as_i64(),
            _ => None,
        })
        .unwrap();

        events.dispatch(&custom("score", json!(10)));
        events.dispatch(&custom("score", json!("bad")));
        events.dispatch(&custom("other", json!(99)));
        assert_eq!(hook.value(), 10);
        assert_eq!(hook.updates(), 1);
    }

    #[test]
    fn teardown_removes_every_listener() {
        let events = EventTarget::new();
        let hook = EventListener::new(&events, &["a", "b"], 0u8, |_| Some(1)).unwrap();
        assert_eq!(events.listener_count("a") + events.listener_count("b"), 2);
        hook.deactivate();
        hook.deactivate();
        assert_eq!(events.listener_count("a") + events.listener_count("b"), 0);
        events.dispatch(&custom("a", json!(null)));
        assert_eq!(hook.value(), 0);
    }

    #[test]
    fn drop_removes_listeners() {
        let events = EventTarget::new();
        let hook = EventListener::new(&events, &["a"], (), |_| Some(())).unwrap();
        drop(hook);
        assert_eq!(events.listener_count("a"), 0);
    }
}
