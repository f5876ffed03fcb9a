#![forbid(unsafe_code)]

//! Resource subscription lifecycle.
//!
//! A [`ResourceHandle`] registers against an external [`Resource`] on
//! [`activate`](ResourceHandle::activate), holds the value the resource most
//! recently delivered through its [`Notifier`], and releases the registration
//! exactly once on [`deactivate`](ResourceHandle::deactivate) or drop.
//!
//! ```text
//!   new ──► Uninitialized ──activate──► Subscribed ◄──► Updating
//!                 ▲                          │   (notify fan-out)
//!                 │ registration failed      │ deactivate / drop
//!                 └──────────────────────────┼─────────────► TornDown
//!                                            │                  │
//!                                            └◄────activate─────┘
//! ```
//!
//! # Invariants
//!
//! 1. A [`Deregister`] is held iff the phase is `Subscribed` or `Updating`.
//! 2. Each [`Deregister`] runs at most once; it is consumed by value.
//! 3. Every activation and teardown bumps the epoch. A [`Notifier`] only
//!    applies values while its epoch is current, so nothing issued for a torn
//!    down registration can mutate the handle, even after re-activation.
//! 4. Watchers run after the value is stored, in registration order.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `AlreadyActive` | `activate` while subscribed | Error, nothing registered |
//! | Registration error | Resource refused | Error, value and phase restored |
//! | Late notification | Callback after teardown | Dropped, `notify` returns `false` |
//! | Teardown during registration | Resource notified and a watcher tore down | Registration released on return |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{HookError, RegistrationError};
use crate::reactive::{Watch, Watchers};

/// Lifecycle phase of a [`ResourceHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Never activated, or the last activation failed to register.
    Uninitialized,
    /// Registered and idle.
    Subscribed,
    /// Registered and fanning a notification out to watchers.
    Updating,
    /// Released. A new `activate` is legal.
    TornDown,
}

impl Phase {
    /// Whether a registration is held in this phase.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Subscribed | Self::Updating)
    }
}

/// One-shot release capability returned by a resource registration.
pub struct Deregister(Box<dyn FnOnce()>);

impl Deregister {
    /// Wrap the resource's unsubscribe call.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self(Box::new(release))
    }

    /// A registration that holds nothing external.
    #[must_use]
    pub fn noop() -> Self {
        Self(Box::new(|| {}))
    }

    /// Run the release.
    pub fn release(self) {
        (self.0)();
    }
}

impl fmt::Debug for Deregister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deregister").finish_non_exhaustive()
    }
}

/// Something a [`ResourceHandle`] can subscribe to.
///
/// `register` runs synchronously inside `activate`. It may deliver values
/// through `notify` immediately (an initial read) or later from host
/// callbacks, and returns the capability that undoes the registration.
pub trait Resource<T> {
    /// Subscribe and return the matching release.
    fn register(self, notify: Notifier<T>) -> Result<Deregister, RegistrationError>;
}

impl<T, F> Resource<T> for F
where
    F: FnOnce(Notifier<T>) -> Result<Deregister, RegistrationError>,
{
    fn register(self, notify: Notifier<T>) -> Result<Deregister, RegistrationError> {
        self(notify)
    }
}

struct HandleInner<T> {
    label: &'static str,
    value: T,
    version: u64,
    phase: Phase,
    epoch: u64,
    deregister: Option<Deregister>,
    watchers: Watchers<T>,
}

/// Owner of one resource registration and the value it delivers.
///
/// Not `Clone`: the registration belongs to exactly one handle. Consumers
/// that need to observe changes use [`watch`](Self::watch).
pub struct ResourceHandle<T: 'static> {
    inner: Rc<RefCell<HandleInner<T>>>,
}

impl<T: Clone + 'static> ResourceHandle<T> {
    /// Create an inactive handle holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::named("resource", initial)
    }

    /// Create an inactive handle with a label used in log output.
    #[must_use]
    pub fn named(label: &'static str, initial: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HandleInner {
                label,
                value: initial,
                version: 0,
                phase: Phase::Uninitialized,
                epoch: 0,
                deregister: None,
                watchers: Watchers::default(),
            })),
        }
    }

    /// Create a handle and activate it against `resource`.
    pub fn activated(initial: T, resource: impl Resource<T>) -> Result<Self, HookError> {
        let handle = Self::new(initial);
        handle.activate(resource)?;
        Ok(handle)
    }

    /// Register against `resource`.
    ///
    /// Returns [`HookError::AlreadyActive`] if a registration is held. If the
    /// resource fails to register, the phase, value and version are restored
    /// to what they were before the call.
    pub fn activate(&self, resource: impl Resource<T>) -> Result<(), HookError> {
        let (epoch, label, prior) = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase.is_active() {
                return Err(HookError::AlreadyActive);
            }
            let prior = (inner.phase, inner.value.clone(), inner.version);
            inner.epoch += 1;
            inner.phase = Phase::Subscribed;
            (inner.epoch, inner.label, prior)
        };

        let notifier = Notifier {
            inner: Rc::downgrade(&self.inner),
            epoch,
        };

        match resource.register(notifier) {
            Ok(deregister) => {
                let mut inner = self.inner.borrow_mut();
                if inner.epoch != epoch {
                    // Torn down while registering; nothing may keep the registration.
                    drop(inner);
                    debug!(target: "tether::resource", resource = label, epoch, "released registration torn down during activate");
                    deregister.release();
                    return Ok(());
                }
                inner.deregister = Some(deregister);
                debug!(target: "tether::resource", resource = label, epoch, "subscribed");
                Ok(())
            }
            Err(err) => {
                let mut inner = self.inner.borrow_mut();
                if inner.epoch == epoch {
                    let (phase, value, version) = prior;
                    inner.phase = phase;
                    inner.value = value;
                    inner.version = version;
                    inner.epoch += 1;
                }
                debug!(target: "tether::resource", resource = label, error = %err, "registration failed");
                Err(HookError::Registration(err))
            }
        }
    }

    /// Release the registration, if any, and move to [`Phase::TornDown`].
    ///
    /// Idempotent: the release runs at most once per activation no matter
    /// how many times this is called.
    pub fn deactivate(&self) {
        let (deregister, label, epoch) = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase == Phase::TornDown {
                return;
            }
            let was_active = inner.phase.is_active();
            inner.phase = Phase::TornDown;
            if was_active {
                inner.epoch += 1;
            }
            (inner.deregister.take(), inner.label, inner.epoch)
        };
        if let Some(deregister) = deregister {
            deregister.release();
            debug!(target: "tether::resource", resource = label, epoch, "torn down");
        }
    }

    /// The most recent value, or the initial value.
    #[must_use]
    pub fn current_value(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Read the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.borrow().phase
    }

    /// Whether a registration is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase().is_active()
    }

    /// Number of notifications applied so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// A notifier for the current registration, if one is held.
    ///
    /// Lets the owner of the handle push values through the same path the
    /// resource uses, so they are dropped once the registration is gone.
    #[must_use]
    pub fn notifier(&self) -> Option<Notifier<T>> {
        let inner = self.inner.borrow();
        inner.phase.is_active().then(|| Notifier {
            inner: Rc::downgrade(&self.inner),
            epoch: inner.epoch,
        })
    }

    /// Run `callback` with every applied value.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        self.inner.borrow_mut().watchers.register(callback)
    }
}

impl<T: 'static> Drop for ResourceHandle<T> {
    fn drop(&mut self) {
        let deregister = match self.inner.try_borrow_mut() {
            Ok(mut inner) => {
                inner.phase = Phase::TornDown;
                inner.epoch += 1;
                inner.deregister.take()
            }
            Err(_) => None,
        };
        if let Some(deregister) = deregister {
            deregister.release();
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ResourceHandle")
            .field("label", &inner.label)
            .field("value", &inner.value)
            .field("phase", &inner.phase)
            .field("epoch", &inner.epoch)
            .field("version", &inner.version)
            .finish()
    }
}

/// Callback side of a registration: delivers values into its handle.
///
/// Cheap to clone. Holds the handle weakly, so a resource keeping a notifier
/// alive never keeps the handle alive.
pub struct Notifier<T> {
    inner: Weak<RefCell<HandleInner<T>>>,
    epoch: u64,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            epoch: self.epoch,
        }
    }
}

impl<T> fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Notifier<T> {
    /// Whether a notification sent now would be applied.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.upgrade().is_some_and(|rc| {
            let inner = rc.borrow();
            inner.epoch == self.epoch && inner.phase.is_active()
        })
    }

    /// Deliver a value. Returns `false` if it was dropped because the
    /// registration it belongs to is gone.
    pub fn notify(&self, value: T) -> bool {
        self.notify_with(|_| value)
    }

    /// Deliver a value computed from the current one.
    ///
    /// `f` is not called when the notification is dropped.
    pub fn notify_with(&self, f: impl FnOnce(&T) -> T) -> bool {
        let Some(rc) = self.inner.upgrade() else {
            trace!(target: "tether::resource", epoch = self.epoch, "dropped notification for released handle");
            return false;
        };

        let (callbacks, value) = {
            let mut inner = rc.borrow_mut();
            if inner.epoch != self.epoch || !inner.phase.is_active() {
                trace!(
                    target: "tether::resource",
                    resource = inner.label,
                    epoch = self.epoch,
                    current = inner.epoch,
                    "dropped notification after teardown"
                );
                return false;
            }
            let next = f(&inner.value);
            inner.value = next;
            inner.version += 1;
            inner.phase = Phase::Updating;
            (inner.watchers.live(), inner.value.clone())
        };

        for cb in &callbacks {
            cb(&value);
        }

        let mut inner = rc.borrow_mut();
        if inner.epoch == self.epoch && inner.phase == Phase::Updating {
            inner.phase = Phase::Subscribed;
        }
        true
    }
}
