#![forbid(unsafe_code)]

//! Pointer position tracking.

use tether_runtime::{HookError, Host, HostEvent, Watch};

use crate::event_listener::EventListener;

/// Last pointer position, `None` until the pointer first moves.
#[derive(Debug)]
pub struct MousePosition {
    listener: EventListener<Option<(i32, i32)>>,
}

impl MousePosition {
    /// Follow `mousemove` on `host`.
    pub fn new(host: &Host) -> Result<Self, HookError> {
        let listener = EventListener::new(
            host.events(),
            &[HostEvent::MOUSE_MOVE],
            None,
            |event| match event {
                HostEvent::MouseMove { x, y } => Some(Some((*x, *y))),
                _ => None,
            },
        )?;
        Ok(Self { listener })
    }

    /// Last `(x, y)` seen.
    #[must_use]
    pub fn position(&self) -> Option<(i32, i32)> {
        self.listener.value()
    }

    /// Observe pointer moves.
    pub fn watch(&self, callback: impl Fn(&Option<(i32, i32)>) + 'static) -> Watch {
        self.listener.watch(callback)
    }

    /// Stop following the pointer. Idempotent.
    pub fn deactivate(&self) {
        self.listener.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_pointer() {
        let host = Host::new();
        let mouse = MousePosition::new(&host).unwrap();
        assert_eq!(mouse.position(), None);
        host.dispatch(&HostEvent::MouseMove { x: 3, y: 4 });
        host.dispatch(&HostEvent::MouseMove { x: 5, y: 6 });
        assert_eq!(mouse.position(), Some((5, 6)));
        drop(mouse);
        assert_eq!(host.events().listener_count(HostEvent::MOUSE_MOVE), 0);
    }
}
