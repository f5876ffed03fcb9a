#![forbid(unsafe_code)]

//! Named global events.
//!
//! [`EventTarget`] is the host's event bus: listeners register for an event
//! name and are called, in registration order, each time an event with that
//! name is dispatched.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

/// Viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    /// `width` by `height`.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// An event dispatched by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The viewport changed size.
    Resize(WindowSize),
    /// Network connectivity came back.
    Online,
    /// Network connectivity was lost.
    Offline,
    /// Pointer moved to the given position.
    MouseMove { x: i32, y: i32 },
    /// Application-defined event with a JSON payload.
    Custom {
        name: String,
        detail: serde_json::Value,
    },
}

impl HostEvent {
    /// Name of [`HostEvent::Resize`].
    pub const RESIZE: &'static str = "resize";
    /// Name of [`HostEvent::Online`].
    pub const ONLINE: &'static str = "online";
    /// Name of [`HostEvent::Offline`].
    pub const OFFLINE: &'static str = "offline";
    /// Name of [`HostEvent::MouseMove`].
    pub const MOUSE_MOVE: &'static str = "mousemove";

    /// Name listeners register under.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Resize(_) => Self::RESIZE,
            Self::Online => Self::ONLINE,
            Self::Offline => Self::OFFLINE,
            Self::MouseMove { .. } => Self::MOUSE_MOVE,
            Self::Custom { name, .. } => name.as_str(),
        }
    }
}

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&HostEvent)>;

#[derive(Default)]
struct TargetInner {
    next_id: u64,
    listeners: Vec<(ListenerId, String, Listener)>,
}

/// Shared event bus. Clones dispatch to the same listeners.
#[derive(Clone, Default)]
pub struct EventTarget {
    inner: Rc<RefCell<TargetInner>>,
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.inner.borrow().listeners.len())
            .finish()
    }
}

impl EventTarget {
    /// A bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `listener` for every event named `name`.
    pub fn add_listener(&self, name: &str, listener: impl Fn(&HostEvent) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner
            .listeners
            .push((id, name.to_owned(), Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _, _)| *lid != id);
        inner.listeners.len() != before
    }

    /// Listeners currently registered for `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|(_, n, _)| n == name)
            .count()
    }

    /// Deliver `event` to its listeners. Returns how many ran.
    ///
    /// A listener removed by an earlier listener during the same dispatch is
    /// skipped.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        let matching: Vec<(ListenerId, Listener)> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .filter(|(_, name, _)| name == event.name())
            .map(|(id, _, l)| (*id, Rc::clone(l)))
            .collect();

        let mut ran = 0;
        for (id, listener) in matching {
            let still_registered = self
                .inner
                .borrow()
                .listeners
                .iter()
                .any(|(lid, _, _)| *lid == id);
            if still_registered {
                listener(event);
                ran += 1;
            }
        }
        trace!(target: "tether::events", event = event.name(), listeners = ran, "dispatched");
        ran
    }
}
