#![forbid(unsafe_code)]

//! Key/value storage capability.
//!
//! Hooks never touch an ambient store: they are handed a [`Storage`]. The
//! in-memory implementation models a browser-style origin store shared by
//! several tabs. Each tab is a [`MemoryStorage`] over the same backing map;
//! a write from one tab produces a [`StorageChange`] for listeners in every
//! *other* tab, never the writer's own.
//!
//! # Invariants
//!
//! 1. `get` after a successful `set` on any tab of the same store returns
//!    the written value.
//! 2. A rejected `set` leaves the store unchanged and notifies nobody.
//! 3. Usage (sum of key and value byte lengths) never exceeds the quota.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::StorageError;

/// A change to one key, as seen from another tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
}

/// Identifier of a change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageListenerId(u64);

/// String key/value store with change notification.
pub trait Storage {
    /// Read a key.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a key.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing a missing key is a no-op.
    fn remove(&self, key: &str);

    /// Listen for changes to `key` made elsewhere.
    fn subscribe(&self, key: &str, listener: Box<dyn Fn(&StorageChange)>) -> StorageListenerId;

    /// Stop listening. Returns `false` if the id was unknown.
    fn unsubscribe(&self, id: StorageListenerId) -> bool;
}

type ChangeListener = Rc<dyn Fn(&StorageChange)>;

struct Listener {
    id: StorageListenerId,
    tab: u64,
    key: String,
    callback: ChangeListener,
}

#[derive(Default)]
struct Backing {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
    next_tab: u64,
    next_listener: u64,
    listeners: Vec<Listener>,
}

impl Backing {
    fn usage(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn usage_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    fn listeners_for(&self, key: &str, writer: u64) -> Vec<ChangeListener> {
        self.listeners
            .iter()
            .filter(|l| l.key == key && l.tab != writer)
            .map(|l| Rc::clone(&l.callback))
            .collect()
    }
}

/// In-memory origin store. Each [`new_tab`](Self::new_tab) is a separate
/// tab; clones share the tab they were cloned from.
#[derive(Clone)]
pub struct MemoryStorage {
    backing: Rc<RefCell<Backing>>,
    tab: u64,
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = self.backing.borrow();
        f.debug_struct("MemoryStorage")
            .field("tab", &self.tab)
            .field("entries", &backing.entries.len())
            .field("quota", &backing.quota)
            .finish()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// An empty, unbounded store with one tab.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backing: Rc::new(RefCell::new(Backing {
                next_tab: 1,
                ..Backing::default()
            })),
            tab: 0,
        }
    }

    /// An empty store that rejects writes beyond `bytes` of usage.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        let storage = Self::new();
        storage.backing.borrow_mut().quota = Some(bytes);
        storage
    }

    /// Another tab over the same backing store.
    #[must_use]
    pub fn new_tab(&self) -> Self {
        let mut backing = self.backing.borrow_mut();
        let tab = backing.next_tab;
        backing.next_tab += 1;
        Self {
            backing: Rc::clone(&self.backing),
            tab,
        }
    }

    /// Bytes used by all entries.
    #[must_use]
    pub fn usage(&self) -> usize {
        self.backing.borrow().usage()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backing.borrow().entries.len()
    }

    /// Whether no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn broadcast(&self, change: &StorageChange) {
        let listeners = self.backing.borrow().listeners_for(&change.key, self.tab);
        for listener in listeners {
            listener(change);
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.backing.borrow().entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old_value = {
            let mut backing = self.backing.borrow_mut();
            if let Some(quota) = backing.quota {
                let needed = backing.usage_without(key) + key.len() + value.len();
                if needed > quota {
                    debug!(target: "tether::storage", key, needed, quota, "write rejected");
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_owned(),
                        needed,
                        quota,
                    });
                }
            }
            backing.entries.insert(key.to_owned(), value.to_owned())
        };
        self.broadcast(&StorageChange {
            key: key.to_owned(),
            old_value,
            new_value: Some(value.to_owned()),
        });
        Ok(())
    }

    fn remove(&self, key: &str) {
        let old_value = self.backing.borrow_mut().entries.remove(key);
        if old_value.is_some() {
            self.broadcast(&StorageChange {
                key: key.to_owned(),
                old_value,
                new_value: None,
            });
        }
    }

    fn subscribe(&self, key: &str, listener: Box<dyn Fn(&StorageChange)>) -> StorageListenerId {
        let mut backing = self.backing.borrow_mut();
        let id = StorageListenerId(backing.next_listener);
        backing.next_listener += 1;
        backing.listeners.push(Listener {
            id,
            tab: self.tab,
            key: key.to_owned(),
            callback: Rc::from(listener),
        });
        id
    }

    fn unsubscribe(&self, id: StorageListenerId) -> bool {
        let mut backing = self.backing.borrow_mut();
        let before = backing.listeners.len();
        backing.listeners.retain(|l| l.id != id);
        backing.listeners.len() != before
    }
}
