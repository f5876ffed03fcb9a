#![forbid(unsafe_code)]

//! Boolean flag with a flip operation.

use tether_runtime::{State, Watch};

/// Local boolean state. Subscribes to nothing.
#[derive(Debug, Clone)]
pub struct Toggle {
    state: State<bool>,
}

impl Toggle {
    /// Flag starting at `initial`.
    #[must_use]
    pub fn new(initial: bool) -> Self {
        Self {
            state: State::new(initial),
        }
    }

    /// Current flag.
    #[must_use]
    pub fn value(&self) -> bool {
        self.state.get()
    }

    /// Flip the flag and return the new value.
    pub fn toggle(&self) -> bool {
        self.state.update(|v| *v = !*v);
        self.value()
    }

    /// Store `value`. Setting the current value is a no-op.
    pub fn set(&self, value: bool) {
        self.state.set(value);
    }

    /// Shorthand for `set(true)`.
    pub fn set_on(&self) {
        self.set(true);
    }

    /// Shorthand for `set(false)`.
    pub fn set_off(&self) {
        self.set(false);
    }

    /// Underlying state cell, for composing with other hooks.
    #[must_use]
    pub fn state(&self) -> &State<bool> {
        &self.state
    }

    /// Observe flips.
    pub fn watch(&self, callback: impl Fn(&bool) + 'static) -> Watch {
        self.state.watch(callback)
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Self::new(false)
    }
}
