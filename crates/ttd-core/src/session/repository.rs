//! Persistence boundary for session snapshots.

use crate::error::Result;
use async_trait::async_trait;

/// Fixed key under which the single session snapshot is stored.
pub const SESSION_KEY: &str = "target-trial-state";

/// An opaque asynchronous string store.
///
/// Implementations decide where the data lives (files, memory, a remote
/// service). Every call may fail; callers treat failures as non-fatal.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: Value found
    /// - `Ok(None)`: Nothing stored under `key`
    /// - `Err(_)`: Backend failure
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removes `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}
