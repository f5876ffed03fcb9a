#![forbid(unsafe_code)]

//! State owned by hooks that subscribe to nothing.
//!
//! Toggle, counter and previous-value tracking only need a cell that
//! remembers how often it changed and tells interested parties when it does.
//! [`State`] is that cell. It never talks to the host, so it has no lifecycle
//! of its own: it lives as long as its last clone.
//!
//! Watchers may write back into the same state from inside their callback.
//! The nested write finishes its own round of callbacks before the outer
//! round resumes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::watchers::{Watch, Watchers};

struct StateInner<T> {
    value: T,
    version: u64,
    watchers: Watchers<T>,
}

/// A hook-local value. Clones share it.
///
/// Writes that leave the value equal (by `PartialEq`) are ignored: no version
/// bump, no callbacks.
pub struct State<T> {
    inner: Rc<RefCell<StateInner<T>>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("State")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> State<T> {
    /// Start at `value`, version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StateInner {
                value,
                version: 0,
                watchers: Watchers::default(),
            })),
        }
    }

    /// Copy out the value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value. `false` means it was already equal and nothing ran.
    pub fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.fan_out();
        true
    }

    /// Edit the value in place; watchers run only if the edit changed it.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.value.clone();
            f(&mut inner.value);
            if inner.value == before {
                false
            } else {
                inner.version += 1;
                true
            }
        };
        if changed {
            self.fan_out();
        }
        changed
    }

    /// Call `callback` after each change until the returned guard drops.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        self.inner.borrow_mut().watchers.register(callback)
    }

    /// How many writes changed the value.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Watcher slots, counting dropped guards until the next change prunes them.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    fn fan_out(&self) {
        let (callbacks, value) = {
            let mut inner = self.inner.borrow_mut();
            (inner.watchers.live(), inner.value.clone())
        };
        for cb in &callbacks {
            cb(&value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_bumps_version_only_on_change() {
        let state = State::new(1);
        assert!(!state.set(1));
        assert_eq!(state.version(), 0);
        assert!(state.set(2));
        assert_eq!(state.get(), 2);
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn update_in_place() {
        let state = State::new(vec![1, 2]);
        assert!(state.update(|v| v.push(3)));
        assert!(!state.update(|v| v.retain(|_| true)));
        assert_eq!(state.with(Vec::len), 3);
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn watchers_see_new_value_in_order() {
        let state = State::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let _a = state.watch(move |v| l1.borrow_mut().push(('a', *v)));
        let l2 = Rc::clone(&log);
        let _b = state.watch(move |v| l2.borrow_mut().push(('b', *v)));

        state.set(7);
        assert_eq!(*log.borrow(), vec![('a', 7), ('b', 7)]);
    }

    #[test]
    fn dropped_watch_stops_callbacks() {
        let state = State::new(0);
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        let watch = state.watch(move |_| h.set(h.get() + 1));

        state.set(1);
        drop(watch);
        state.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(state.watcher_count(), 0);
    }

    #[test]
    fn clones_share_value() {
        let a = State::new(String::from("x"));
        let b = a.clone();
        b.set("y".into());
        assert_eq!(a.get(), "y");
        assert_eq!(a.version(), 1);
    }

    #[test]
    fn debug_output_names_watchers() {
        let state = State::new(3u8);
        let _w = state.watch(|_| {});
        let shown = format!("{state:?}");
        assert!(shown.contains("value: 3"));
        assert!(shown.contains("watchers: 1"));
    }

    #[test]
    fn reentrant_set_from_watcher() {
        let state = State::new(0);
        let inner = state.clone();
        let _w = state.watch(move |v| {
            if *v == 1 {
                inner.set(2);
            }
        });
        state.set(1);
        assert_eq!(state.get(), 2);
        assert_eq!(state.version(), 2);
    }
}
