#![forbid(unsafe_code)]

//! Hook-local state and change callbacks.
//!
//! [`State`] backs the hooks that own a value without subscribing to
//! anything external. [`Watchers`] is the callback list it shares with
//! [`ResourceHandle`](crate::ResourceHandle), and [`Watch`] is the guard a
//! consumer holds to keep its callback registered.
//!
//! The list stores callbacks weakly and the guard stores them strongly.
//! Dropping the guard is the only way to unregister; the list notices on its
//! next fan-out and forgets the slot.

pub mod state;
pub mod watchers;

pub use state::State;
pub use watchers::{Watch, Watchers};
