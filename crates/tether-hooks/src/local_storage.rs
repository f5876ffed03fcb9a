#![forbid(unsafe_code)]

//! A JSON value persisted under one storage key.
//!
//! Activation reads the key synchronously and subscribes to changes made by
//! other tabs. Writes go through to storage before the held value changes, so
//! after every successful [`LocalStorage::set`] the store and the value agree.
//! A torn down hook refuses writes with [`HookError::Inactive`].
//! A stored value that fails to decode is ignored in favour of the initial
//! value.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_runtime::{
    Deregister, HookError, Notifier, RegistrationError, ResourceHandle, Storage, StorageChange,
    StorageError, Watch,
};
use tracing::warn;

/// Value of `key` in `storage`, kept in sync across tabs.
pub struct LocalStorage<T: 'static> {
    storage: Rc<dyn Storage>,
    key: String,
    initial: T,
    handle: ResourceHandle<T>,
}

impl<T: fmt::Debug + 'static> fmt::Debug for LocalStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorage")
            .field("key", &self.key)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(target: "tether::hooks", key, error = %err, "ignoring undecodable stored value");
            None
        }
    }
}

impl<T> LocalStorage<T>
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    /// Bind `key`, falling back to `initial` when nothing usable is stored.
    pub fn new(storage: Rc<dyn Storage>, key: &str, initial: T) -> Result<Self, HookError> {
        let hook = Self {
            storage,
            key: key.to_owned(),
            initial: initial.clone(),
            handle: ResourceHandle::named("local_storage", initial),
        };
        hook.activate()?;
        Ok(hook)
    }

    fn activate(&self) -> Result<(), HookError> {
        let storage = Rc::clone(&self.storage);
        let key = self.key.clone();
        let initial = self.initial.clone();
        self.handle.activate(
            move |notify: Notifier<T>| -> Result<Deregister, RegistrationError> {
                if let Some(stored) = storage.get(&key).and_then(|raw| decode::<T>(&key, &raw)) {
                    notify.notify(stored);
                }

                let listener_key = key.clone();
                let id = storage.subscribe(
                    &key,
                    Box::new(move |change: &StorageChange| {
                        let next = match &change.new_value {
                            Some(raw) => match decode::<T>(&listener_key, raw) {
                                Some(value) => value,
                                None => return,
                            },
                            None => initial.clone(),
                        };
                        notify.notify(next);
                    }),
                );
                Ok(Deregister::new(move || {
                    storage.unsubscribe(id);
                }))
            },
        )
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> T {
        self.handle.current_value()
    }

    /// Storage key this hook is bound to.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist `value`, then hold it.
    ///
    /// On error nothing is written and the held value is unchanged.
    pub fn set(&self, value: T) -> Result<(), HookError> {
        let notify = self.handle.notifier().ok_or(HookError::Inactive)?;
        let raw = serde_json::to_string(&value).map_err(StorageError::from)?;
        self.storage.set(&self.key, &raw)?;
        notify.notify(value);
        Ok(())
    }

    /// Apply `f` to the current value and persist the result.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), HookError> {
        let next = self.handle.with(f);
        self.set(next)
    }

    /// Delete the key and fall back to the initial value.
    pub fn remove(&self) -> Result<(), HookError> {
        let notify = self.handle.notifier().ok_or(HookError::Inactive)?;
        self.storage.remove(&self.key);
        notify.notify(self.initial.clone());
        Ok(())
    }

    /// Observe local writes and changes from other tabs.
    pub fn watch(&self, callback: impl Fn(&T) + 'static) -> Watch {
        self.handle.watch(callback)
    }

    /// Whether writes are still accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Stop following other tabs. Idempotent.
    pub fn deactivate(&self) {
        self.handle.deactivate();
    }
}
