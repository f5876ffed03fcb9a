#![forbid(unsafe_code)]

//! Runtime for Tether hooks.
//!
//! A hook is a small owner of state that subscribes to something outside
//! itself (a timer, a storage key, a global event, a network request) and
//! must release that subscription exactly once. This crate provides:
//!
//! - [`resource`]: the lifecycle primitive ([`ResourceHandle`]) every
//!   subscribing hook is built on.
//! - [`reactive`]: local, version-tracked [`State`] for hooks that subscribe
//!   to nothing.
//! - [`host`], [`timer`], [`events`]: the single-threaded host with a
//!   virtual clock and a global event bus.
//! - [`storage`] and [`fetch`]: injected capabilities with in-memory and
//!   scripted implementations.
//! - [`config`] and [`error`]: shared configuration and error types.
//!
//! Nothing here is `Send`. All waiting is expressed as a registered callback,
//! and time moves only when the host is advanced.

pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod host;
pub mod reactive;
pub mod resource;
pub mod storage;
pub mod timer;

pub use config::{HookConfig, RetryPolicy};
pub use error::{FetchError, HookError, RegistrationError, StorageError};
pub use events::{EventTarget, HostEvent, ListenerId, WindowSize};
pub use fetch::{FetchCache, Method, MockTransport, Request, RequestId, Response, Transport};
pub use host::Host;
pub use reactive::{State, Watch};
pub use resource::{Deregister, Notifier, Phase, Resource, ResourceHandle};
pub use storage::{MemoryStorage, Storage, StorageChange, StorageListenerId};
pub use timer::{TimerId, Timers};
