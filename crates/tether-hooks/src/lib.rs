#![forbid(unsafe_code)]

//! Stateful-resource hooks.
//!
//! Each hook owns one value and, where it subscribes to something outside
//! itself, one [`ResourceHandle`](tether_runtime::ResourceHandle) that
//! guarantees the subscription is released exactly once, whether by an
//! explicit `deactivate` or by drop.
//!
//! | Hook | Value | Subscribes to |
//! |------|-------|---------------|
//! | [`Toggle`], [`Counter`], [`Previous`] | local state | nothing |
//! | [`LocalStorage`] | JSON under one key | storage changes from other tabs |
//! | [`Debounced`] | last upstream value | one armed timeout |
//! | [`EventListener`] | mapped event payload | named host events |
//! | [`WindowSizeTracker`], [`OnlineStatus`], [`MousePosition`] | host state | `resize`, `online`/`offline`, `mousemove` |
//! | [`Fetch`] | [`FetchState`] | one request or backoff timer |
//! | [`Interval`] | tick count | one repeating timer |

pub mod counter;
pub mod debounce;
pub mod event_listener;
pub mod fetch;
pub mod interval;
pub mod local_storage;
pub mod mouse_position;
pub mod online_status;
pub mod previous;
pub mod toggle;
pub mod window_size;

pub use counter::Counter;
pub use debounce::Debounced;
pub use event_listener::EventListener;
pub use fetch::{Fetch, FetchOptions, FetchState};
pub use interval::Interval;
pub use local_storage::LocalStorage;
pub use mouse_position::MousePosition;
pub use online_status::OnlineStatus;
pub use previous::Previous;
pub use toggle::Toggle;
pub use window_size::WindowSizeTracker;
