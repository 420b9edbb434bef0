//! Persisted client state in the OS credential store.
//!
//! Two values survive between runs: the admin bearer token and the sidebar
//! preference. On Windows this is the Credential Manager, on macOS the
//! Keychain and on Linux the Secret Service API. All reads are best-effort:
//! a broken store behaves like an empty one.

use keyring::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

const SERVICE_NAME: &str = "cashback-console";

pub const KEY_ADMIN_TOKEN: &str = "cashback_admin_token";
pub const KEY_ADMIN_SIDEBAR: &str = "cashback_admin_sidebar";

#[derive(Debug, Error)]
#[error("credential store error for {key}: {message}")]
pub struct StorageError {
    pub key: String,
    pub message: String,
}

impl StorageError {
    fn new(key: &str, message: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub trait SecureStore: Send + Sync {
    /// `None` when the key is absent or the store could not be read.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// OS keyring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }
}

impl KeyringStore {
    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(|e| StorageError::new(key, e))
    }
}

impl SecureStore for KeyringStore {
    fn get(&self, key: &str) -> Option<String> {
        let entry = match self.entry(key) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, error = %e, "keyring: failed to create entry");
                return None;
            }
        };
        match entry.get_password() {
            Ok(pw) => Some(pw),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "keyring: failed to read credential");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StorageError::new(key, e))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::new(key, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store for `--ephemeral` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl SecureStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.lock() {
            Ok(map) => map.get(key).cloned(),
            Err(_) => {
                warn!(key, "memory store lock poisoned");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self
            .values
            .lock()
            .map_err(|_| StorageError::new(key, "lock poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self
            .values
            .lock()
            .map_err(|_| StorageError::new(key, "lock poisoned"))?;
        map.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

pub fn load_token(store: &dyn SecureStore) -> Option<String> {
    store
        .get(KEY_ADMIN_TOKEN)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn save_token(store: &dyn SecureStore, token: &str) -> Result<(), StorageError> {
    store.set(KEY_ADMIN_TOKEN, token)
}

/// Remove the stored token; failures are logged, never raised.
pub fn clear_token(store: &dyn SecureStore) {
    if let Err(e) = store.delete(KEY_ADMIN_TOKEN) {
        warn!(error = %e, "failed to clear stored token");
    }
}

/// Sidebar preference; anything other than `"collapsed"` means expanded.
pub fn sidebar_collapsed(store: &dyn SecureStore) -> bool {
    store.get(KEY_ADMIN_SIDEBAR).as_deref() == Some("collapsed")
}

pub fn set_sidebar_collapsed(store: &dyn SecureStore, collapsed: bool) -> Result<(), StorageError> {
    let value = if collapsed { "collapsed" } else { "expanded" };
    store.set(KEY_ADMIN_SIDEBAR, value)
}
