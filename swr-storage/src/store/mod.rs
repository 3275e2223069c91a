//! Shared key-value store abstraction.
//!
//! The cache keeps both its entries and its revalidation locks in a single
//! external store shared by every process. The only capabilities required
//! are atomic per-key `get`, `set` (unconditional or only-if-absent, with a
//! TTL) and `delete`. Nothing here spans more than one key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swr_core::StoreResult;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Write mode for [`StoreClient::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetMode {
    /// Overwrite whatever is there.
    Always,
    /// Write only if the key is currently absent. Must be atomic: two
    /// concurrent callers can never both succeed.
    IfAbsent,
}

/// Store backend trait for pluggable shared stores.
///
/// Implementations must be thread-safe. Every call is network-fallible; the
/// cache bounds each call with a timeout and drops the future when it fires,
/// so implementations must tolerate being cancelled at any `.await`.
///
/// # TTL
///
/// A `ttl` of zero means the key never expires.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Read a key. `Ok(None)` when absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a key.
    ///
    /// Returns `Ok(true)` if the value was written. With
    /// [`SetMode::IfAbsent`], `Ok(false)` means the key already existed and
    /// nothing changed; with [`SetMode::Always`] the result is always
    /// `Ok(true)` on success.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration, mode: SetMode)
        -> StoreResult<bool>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str {
        "unknown"
    }
}

#[async_trait]
impl<S: StoreClient + ?Sized> StoreClient for Arc<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        mode: SetMode,
    ) -> StoreResult<bool> {
        (**self).set(key, value, ttl, mode).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}
