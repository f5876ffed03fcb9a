#![forbid(unsafe_code)]

//! The single-threaded host that hooks run against.
//!
//! A [`Host`] bundles the virtual clock ([`Timers`]), the global event bus
//! ([`EventTarget`]) and the window facts hooks read synchronously at
//! activation (size, connectivity). Everything is shared by reference
//! counting; cloning a `Host` gives another handle to the same world.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::events::{EventTarget, HostEvent, WindowSize};
use crate::timer::Timers;

/// Window size a fresh host starts with.
pub const DEFAULT_WINDOW_SIZE: WindowSize = WindowSize::new(1024, 768);

/// Shared host capabilities.
#[derive(Debug, Clone)]
pub struct Host {
    timers: Timers,
    events: EventTarget,
    size: Rc<Cell<WindowSize>>,
    online: Rc<Cell<bool>>,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    /// A host at time zero, online, with [`DEFAULT_WINDOW_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: Timers::new(),
            events: EventTarget::new(),
            size: Rc::new(Cell::new(DEFAULT_WINDOW_SIZE)),
            online: Rc::new(Cell::new(true)),
        }
    }

    /// Set the initial window size.
    #[must_use]
    pub fn with_window_size(self, size: WindowSize) -> Self {
        self.size.set(size);
        self
    }

    /// Set the initial connectivity.
    #[must_use]
    pub fn with_online(self, online: bool) -> Self {
        self.online.set(online);
        self
    }

    /// The virtual clock.
    #[must_use]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// The global event bus.
    #[must_use]
    pub fn events(&self) -> &EventTarget {
        &self.events
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Advance the virtual clock, running due timers.
    pub fn advance(&self, by: Duration) -> usize {
        self.timers.advance(by)
    }

    /// Current window size.
    #[must_use]
    pub fn window_size(&self) -> WindowSize {
        self.size.get()
    }

    /// Current connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.get()
    }

    /// Change the window size and dispatch `resize`.
    pub fn resize(&self, width: u32, height: u32) {
        let size = WindowSize::new(width, height);
        self.size.set(size);
        debug!(target: "tether::host", width, height, "resize");
        self.events.dispatch(&HostEvent::Resize(size));
    }

    /// Change connectivity. Dispatches `online`/`offline` only on a change.
    pub fn set_online(&self, online: bool) {
        if self.online.replace(online) == online {
            return;
        }
        debug!(target: "tether::host", online, "connectivity changed");
        let event = if online {
            HostEvent::Online
        } else {
            HostEvent::Offline
        };
        self.events.dispatch(&event);
    }

    /// Dispatch an arbitrary event.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        self.events.dispatch(event)
    }
}
