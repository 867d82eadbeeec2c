//! In-memory storage for tests and hosts without durable storage.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::SessionStorage;
use crate::error::StorageError;

/// In-memory key-value storage.
///
/// Supports failure injection so tests can exercise the collector's
/// degraded modes: a byte quota, and a switch that disables storage entirely.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
    disabled: RwLock<bool>,
}

impl MemoryStorage {
    /// Create an empty store with no quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects values larger than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Seed a value directly, bypassing quota and the disabled switch.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Read a value directly.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Make every operation fail with [`StorageError::Unavailable`], as a
    /// browser in private mode would.
    pub fn set_disabled(&self, disabled: bool) {
        *self.disabled.write() = disabled;
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_enabled(&self) -> Result<(), StorageError> {
        if *self.disabled.read() {
            return Err(StorageError::Unavailable("storage disabled".into()));
        }
        Ok(())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        if let Some(limit) = self.quota_bytes {
            if value.len() > limit {
                return Err(StorageError::QuotaExceeded {
                    attempted: value.len(),
                    limit,
                });
            }
        }
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        self.entries.write().remove(key);
        Ok(())
    }
}
