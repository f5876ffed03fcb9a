#![forbid(unsafe_code)]

//! Trailing-edge debounce.
//!
//! Every upstream [`set`](Debounced::set) cancels the armed timer and arms a
//! new one, so a burst of updates inside the window produces exactly one
//! downstream value: the last one. At most one timer is armed per instance.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tether_runtime::{
    Deregister, HookConfig, HookError, Notifier, RegistrationError, ResourceHandle, TimerId,
    Timers, Watch,
};
use tracing::trace;

type Pending<T> = Rc<RefCell<Option<(TimerId, T)>>>;

/// Debounced copy of an upstream value.
pub struct Debounced<T: 'static> {
    timers: Timers,
    delay: Duration,
    pending: Pending<T>,
    handle: ResourceHandle<T>,
}

impl<T: fmt::Debug + 'static> fmt::Debug for Debounced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("delay", &self.delay)
            .field("pending", &self.pending.borrow().is_some())
            .field("handle", &self.handle)
            .finish()
    }
}

impl<T: Clone + 'static> Debounced<T> {
    /// Start with `initial` downstream. A zero `delay` is rejected.
    pub fn new(timers: &Timers, initial: T, delay: Duration) -> Result<Self, HookError> {
        if delay.is_zero() {
            return Err(HookError::InvalidDelay);
        }
        let hook = Self {
            timers: timers.clone(),
            delay,
            pending: Rc::new(RefCell::new(None)),
            handle: ResourceHandle::named("debounce", initial),
        };
        let pending = Rc::clone(&hook.pending);
        let timers = hook.timers.clone();
        hook.handle.activate(
            move |_: Notifier<T>| -> Result<Deregister, RegistrationError> {
                Ok(Deregister::new(move || {
                    if let Some((id, _)) = pending.borrow_mut().take() {
                        timers.clear(id);
                    }
                }))
            },
        )?;
        Ok(hook)
    }

    /// Debounce with `config.debounce_delay`.
    pub fn from_config(timers: &Timers, initial: T, config: &HookConfig) -> Result<Self, HookError> {
        Self::new(timers, initial, config.debounce_delay)
    }

    /// Feed an upstream value. Returns `false` once torn down.
    pub fn set(&self, value: T) -> bool {
        let Some(notify) = self.handle.notifier() else {
            return false;
        };
        self.cancel();

        let pending = Rc::clone(&self.pending);
        let id = self.timers.set_timeout(self.delay, move || {
            let fired = pending.borrow_mut().take();
            if let Some((_, value)) = fired {
                notify.notify(value);
            }
        });
        trace!(target: "tether::hooks", delay = ?self.delay, "debounce armed");
        *self.pending.borrow_mut() = Some((id, value));
        true
    }

    /// Deliver the pending value now instead of waiting.
    pub fn flush(&self) -> bool {
        let taken = self.pending.borrow_mut().take();
        let Some((id, value)) = taken else {
            return false;
        };
        self.timers.clear(id);
        self.handle
            .notifier()
            .is_some_and(|notify| notify.notify(value))
    }

    /// Drop the pending value, if any.
    pub fn cancel(&self) -> bool {
        let taken = self.pending.borrow_mut().take();
        match taken {
            Some((id, _)) => {
                self.timers.clear(id);
                true
            }
            None => false,
        }
    }

    /// Whether a timer is armed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Last value that made it through the window.
    #[must_use]
    pub fn value(&self) -> T {
        self.handle.current_value()
    }

    /// Downstream values delivered so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.handle.version()
    }

    /// Observe values as they come out of the window.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        self.handle.watch(callback)
    }

    /// Cancel any armed timer and stop accepting values. Idempotent.
    pub fn deactivate(&self) {
        self.handle.deactivate();
    }
}
