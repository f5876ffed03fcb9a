#![forbid(unsafe_code)]

//! Ordered list of weakly-held change callbacks.

use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

/// Change callbacks in registration order.
///
/// The list only holds `Weak` references; the strong side lives in the
/// [`Watch`] returned by [`Watchers::register`].
pub struct Watchers<T> {
    entries: Vec<CallbackWeak<T>>,
}

impl<T> Default for Watchers<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Watchers<T> {
    /// Number of registered entries, including dead ones not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: 'static> Watchers<T> {
    /// Register a callback and return the guard that keeps it alive.
    pub fn register(&mut self, callback: impl Fn(&T) + 'static) -> Watch {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.entries.push(Rc::downgrade(&strong));
        Watch {
            _guard: Box::new(strong),
        }
    }

    /// Prune dead entries and return the live callbacks, in order.
    ///
    /// Callers must invoke the returned callbacks after releasing any
    /// borrow of the structure that owns this list.
    pub fn live(&mut self) -> Vec<CallbackRc<T>> {
        self.entries.retain(|w| w.strong_count() > 0);
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }
}

/// RAII guard for a change callback.
///
/// Dropping the guard drops the only strong reference to the callback, so the
/// weak entry in the watcher list can no longer be upgraded.
pub struct Watch {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch").finish_non_exhaustive()
    }
}
