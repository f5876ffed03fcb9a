#![forbid(unsafe_code)]

//! Error types for resource lifecycles and host capabilities.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `AlreadyActive` | `activate` on a subscribed handle | Returned, handle untouched |
//! | `Registration` | Resource refused to register | Returned, handle stays inactive |
//! | `InvalidDelay` | Zero delay for a timer-driven hook | Returned before registering |
//! | `Storage` | Write-through persist failed | Returned, current value untouched |
//! | `Inactive` | Write to a torn down hook | Returned, nothing persisted |
//!
//! Fetch failures are not errors of the hook itself: they are delivered as
//! [`FetchError`] values inside the fetch state.

use std::fmt;

/// Errors surfaced synchronously by hook and handle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// `activate` was called while a subscription is already held.
    AlreadyActive,
    /// The resource failed while registering.
    Registration(RegistrationError),
    /// A timer-driven hook was configured with a zero delay.
    InvalidDelay,
    /// Persisting a value to storage failed.
    Storage(StorageError),
    /// The hook was torn down and no longer accepts writes.
    Inactive,
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "resource handle is already active"),
            Self::Registration(err) => write!(f, "resource registration failed: {err}"),
            Self::InvalidDelay => write!(f, "delay must be greater than zero"),
            Self::Storage(err) => write!(f, "storage write failed: {err}"),
            Self::Inactive => write!(f, "hook has been torn down"),
        }
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registration(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::AlreadyActive | Self::InvalidDelay | Self::Inactive => None,
        }
    }
}

impl From<RegistrationError> for HookError {
    fn from(err: RegistrationError) -> Self {
        Self::Registration(err)
    }
}

impl From<StorageError> for HookError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Why an external resource refused a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The host denied access to the resource.
    PermissionDenied(String),
    /// Any other resource-specific failure.
    Other(String),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied(what) => write!(f, "permission denied: {what}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Errors from key/value storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Writing the entry would exceed the storage quota.
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },
    /// The value could not be serialized for storage.
    Serialize(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaExceeded { key, needed, quota } => write!(
                f,
                "quota exceeded writing '{key}': needs {needed} bytes, quota is {quota}"
            ),
            Self::Serialize(msg) => write!(f, "serialize: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// Failure outcome of a network request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The transport could not complete the request.
    Network(String),
    /// The server answered with an error status (>= 400).
    Status(u16),
    /// The response body did not decode into the expected type.
    Decode(String),
}

impl FetchError {
    /// Whether a retry policy may retry this failure.
    ///
    /// Transport failures and server-side (5xx) statuses are retryable;
    /// client errors and decode failures are final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => *code >= 500,
            Self::Decode(_) => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status(code) => write!(f, "http status {code}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}
