#![forbid(unsafe_code)]

//! Repeating tick counter.
//!
//! Each tick delivers the next count (1, 2, 3, ...). Changing the delay tears
//! the running timer down and arms a fresh one; the live timer is never
//! adjusted in place, so no drift carries over. The count survives delay
//! changes and pauses.

use std::cell::Cell;
use std::time::Duration;

use tether_runtime::{
    Deregister, HookConfig, HookError, Notifier, RegistrationError, ResourceHandle, Timers, Watch,
};
use tracing::debug;

/// Tick counter driven by a repeating timer.
#[derive(Debug)]
pub struct Interval {
    timers: Timers,
    delay: Cell<Option<Duration>>,
    handle: ResourceHandle<u64>,
}

impl Interval {
    /// Start ticking every `delay`, or paused when `delay` is `None`.
    pub fn new(timers: &Timers, delay: Option<Duration>) -> Result<Self, HookError> {
        if delay.is_some_and(|d| d.is_zero()) {
            return Err(HookError::InvalidDelay);
        }
        let hook = Self {
            timers: timers.clone(),
            delay: Cell::new(delay),
            handle: ResourceHandle::named("interval", 0),
        };
        if let Some(delay) = delay {
            hook.arm(delay)?;
        }
        Ok(hook)
    }

    /// Start ticking every `config.interval_delay`.
    pub fn from_config(timers: &Timers, config: &HookConfig) -> Result<Self, HookError> {
        Self::new(timers, Some(config.interval_delay))
    }

    fn arm(&self, delay: Duration) -> Result<(), HookError> {
        let timers = self.timers.clone();
        self.handle.activate(
            move |notify: Notifier<u64>| -> Result<Deregister, RegistrationError> {
                let id = timers.set_interval(delay, move || {
                    notify.notify_with(|count| count + 1);
                });
                Ok(Deregister::new(move || {
                    timers.clear(id);
                }))
            },
        )
    }

    /// Change the delay. `None` pauses.
    ///
    /// A different delay tears down the running timer and arms a new one.
    /// Setting the current delay again does nothing.
    pub fn set_delay(&self, delay: Option<Duration>) -> Result<(), HookError> {
        if delay.is_some_and(|d| d.is_zero()) {
            return Err(HookError::InvalidDelay);
        }
        if self.delay.get() == delay && self.handle.is_active() == delay.is_some() {
            return Ok(());
        }
        debug!(target: "tether::hooks", from = ?self.delay.get(), to = ?delay, "interval delay changed");
        self.handle.deactivate();
        self.delay.set(delay);
        match delay {
            Some(delay) => self.arm(delay),
            None => Ok(()),
        }
    }

    /// Ticks delivered so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.handle.current_value()
    }

    /// Current period; `None` while paused.
    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        self.delay.get()
    }

    /// Whether a timer is armed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_active()
    }

    /// Observe each tick.
    pub fn watch(&self, callback: impl Fn(&u64) + 'static) -> Watch {
        self.handle.watch(callback)
    }

    /// Stop ticking. Idempotent.
    pub fn deactivate(&self) {
        self.handle.deactivate();
    }
}
