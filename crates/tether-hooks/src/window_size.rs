#![forbid(unsafe_code)]

//! Window size tracking.

use tether_runtime::{HookError, Host, HostEvent, Watch, WindowSize};

use crate::event_listener::EventListener;

/// Current window size, following `resize` events.
#[derive(Debug)]
pub struct WindowSizeTracker {
    listener: EventListener<WindowSize>,
}

impl WindowSizeTracker {
    /// Read the size now and follow resizes.
    pub fn new(host: &Host) -> Result<Self, HookError> {
        let listener = EventListener::new(
            host.events(),
            &[HostEvent::RESIZE],
            host.window_size(),
            |event| match event {
                HostEvent::Resize(size) => Some(*size),
                _ => None,
            },
        )?;
        Ok(Self { listener })
    }

    /// Last known size.
    #[must_use]
    pub fn size(&self) -> WindowSize {
        self.listener.value()
    }

    /// Observe resizes.
    pub fn watch(&self, callback: impl Fn(&WindowSize) + 'static) -> Watch {
        self.listener.watch(callback)
    }

    /// Stop following resizes. Idempotent.
    pub fn deactivate(&self) {
        self.listener.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_size_then_resizes() {
        let host = Host::new().with_window_size(WindowSize::new(1280, 720));
        let tracker = WindowSizeTracker::new(&host).unwrap();
        assert_eq!(tracker.size(), WindowSize::new(1280, 720));

        host.resize(640, 480);
        assert_eq!(tracker.size(), WindowSize::new(640, 480));

        tracker.deactivate();
        host.resize(1, 1);
        assert_eq!(tracker.size(), WindowSize::new(640, 480));
        assert_eq!(host.events().listener_count(HostEvent::RESIZE), 0);
    }
}
