//! Client-side key-value storage backends for the telemetry collector.
//!
//! The collector is the only reader and writer. Backends are synchronous, like
//! the browser storage APIs they stand in for, and report every failure as a
//! [`StorageError`] rather than panicking.

pub mod memory;
pub mod file;

use crate::error::StorageError;

/// Trait for persistent client-side key-value stores.
///
/// Values are opaque strings (the collector stores serialized JSON).
pub trait SessionStorage: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub use memory::MemoryStorage;
pub use file::FileStorage;
