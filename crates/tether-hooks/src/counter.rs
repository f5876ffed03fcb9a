#![forbid(unsafe_code)]

//! Integer counter with optional bounds.

use tether_runtime::{State, Watch};

/// Local counter. Every write is clamped into `[min, max]`.
#[derive(Debug, Clone)]
pub struct Counter {
    state: State<i64>,
    initial: i64,
    step: i64,
    min: Option<i64>,
    max: Option<i64>,
}

impl Counter {
    /// Unbounded counter at `initial` with step 1.
    #[must_use]
    pub fn new(initial: i64) -> Self {
        Self {
            state: State::new(initial),
            initial,
            step: 1,
            min: None,
            max: None,
        }
    }

    /// Clamp to `[min, max]`. The current value is clamped immediately.
    #[must_use]
    pub fn with_bounds(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min = min;
        self.max = max;
        let clamped = self.clamp(self.state.get());
        self.state.set(clamped);
        self
    }

    /// Amount added or subtracted per step.
    #[must_use]
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    fn clamp(&self, value: i64) -> i64 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }

    /// Current count.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.state.get()
    }

    /// Add one step; returns the stored value.
    pub fn increment(&self) -> i64 {
        self.set(self.value().saturating_add(self.step))
    }

    /// Subtract one step; returns the stored value.
    pub fn decrement(&self) -> i64 {
        self.set(self.value().saturating_sub(self.step))
    }

    /// Back to the initial value (clamped).
    pub fn reset(&self) -> i64 {
        self.set(self.initial)
    }

    /// Store `value` clamped into bounds; returns what was stored.
    pub fn set(&self, value: i64) -> i64 {
        let value = self.clamp(value);
        self.state.set(value);
        value
    }

    /// Observe changes.
    pub fn watch(&self, callback: impl Fn(&i64) + 'static) -> Watch {
        self.state.watch(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_and_reset() {
        let counter = Counter::new(10).with_step(5);
        counter.increment();
        counter.increment();
        assert_eq!(counter.decrement(), 15);
        assert_eq!(counter.reset(), 10);
    }

    #[test]
    fn bounds_clamp() {
        let counter = Counter::new(0).with_bounds(Some(0), Some(2));
        for _ in 0..5 {
            counter.increment();
        }
        assert_eq!(counter.value(), 2);
        assert_eq!(counter.set(-7), 0);
    }

    #[test]
    fn initial_outside_bounds_is_clamped() {
        let counter = Counter::new(50).with_bounds(None, Some(20));
        assert_eq!(counter.value(), 20);
        assert_eq!(counter.reset(), 20);
    }
}
