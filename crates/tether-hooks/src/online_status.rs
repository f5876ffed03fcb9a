#![forbid(unsafe_code)]

//! Network connectivity tracking.

use tether_runtime::{HookError, Host, HostEvent, Watch};

use crate::event_listener::EventListener;

/// Whether the host is online, following `online`/`offline` events.
#[derive(Debug)]
pub struct OnlineStatus {
    listener: EventListener<bool>,
}

impl OnlineStatus {
    /// Read connectivity from `host` now and follow changes.
    pub fn new(host: &Host) -> Result<Self, HookError> {
        let listener = EventListener::new(
            host.events(),
            &[HostEvent::ONLINE, HostEvent::OFFLINE],
            host.is_online(),
            |event| match event {
                HostEvent::Online => Some(true),
                HostEvent::Offline => Some(false),
                _ => None,
            },
        )?;
        Ok(Self { listener })
    }

    /// Last known connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.listener.value()
    }

    /// Observe connectivity flips.
    pub fn watch(&self, callback: impl Fn(&bool) + 'static) -> Watch {
        self.listener.watch(callback)
    }

    /// Stop following connectivity. Idempotent.
    pub fn deactivate(&self) {
        self.listener.deactivate();
    }
}
