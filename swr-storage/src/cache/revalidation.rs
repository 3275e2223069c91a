//! Cross-process single-flight for revalidation.
//!
//! A revalidation lock is a lease: a second key in the shared store, created
//! with an atomic set-if-absent and given a TTL equal to the maximum
//! revalidation window. Whoever creates it runs the refresh; everyone else
//! walks away. Explicit release is cleanup, expiry is the backstop for a
//! holder that crashed or hung.
//!
//! # Lease lifecycle
//!
//! ```text
//! (absent) ─── try_acquire() ──→ RevalidationLease ─── release() ──→ (absent)
//!                                        │
//!                                 window elapses ──→ (absent)
//! ```

use std::sync::Arc;
use std::time::Duration;

use swr_core::{add_duration, Clock, StoreError, StoreResult, Timestamp};
use uuid::Uuid;

use crate::store::{SetMode, StoreClient};

/// Result of one revalidation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevalidationOutcome {
    /// The source returned a value and it was written.
    Refreshed,
    /// The source failed; the stale entry was removed.
    Evicted,
    /// The source returned a value but writing it failed.
    WriteFailed,
    /// Another holder has the lock; nothing was done.
    Skipped,
    /// The lock could not be attempted because the store failed.
    LockUnavailable,
}

impl RevalidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refreshed => "refreshed",
            Self::Evicted => "evicted",
            Self::WriteFailed => "write_failed",
            Self::Skipped => "skipped",
            Self::LockUnavailable => "lock_unavailable",
        }
    }

    /// True if this attempt held the lock and called the source.
    pub fn ran(&self) -> bool {
        matches!(self, Self::Refreshed | Self::Evicted | Self::WriteFailed)
    }
}

impl std::fmt::Display for RevalidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A held revalidation lock.
///
/// Not `Clone`: [`RevalidationCoordinator::release`] consumes it, so a lease
/// is released at most once. Dropping a lease without releasing it leaves
/// the key to expire on its own.
#[derive(Debug)]
#[must_use = "a lease that is never released blocks refreshes until it expires"]
pub struct RevalidationLease {
    lock_key: String,
    acquired_at: Timestamp,
    expires_at: Timestamp,
}

impl RevalidationLease {
    /// The store key holding this lease.
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub fn acquired_at(&self) -> Timestamp {
        self.acquired_at
    }

    /// When the store will drop the lease on its own.
    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }
}

/// Issues and releases revalidation leases against a shared store.
pub struct RevalidationCoordinator<S: StoreClient + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    lock_key_prefix: String,
    window: Duration,
    store_timeout: Duration,
    holder_id: Uuid,
}

impl<S: StoreClient + ?Sized> RevalidationCoordinator<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        lock_key_prefix: impl Into<String>,
        window: Duration,
        store_timeout: Duration,
        holder_id: Uuid,
    ) -> Self {
        Self {
            store,
            clock,
            lock_key_prefix: lock_key_prefix.into(),
            window,
            store_timeout,
            holder_id,
        }
    }

    /// Lock key for a cache key.
    pub fn lock_key(&self, key: &str) -> String {
        format!("{}{}", self.lock_key_prefix, key)
    }

    /// Lease lifetime.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Try to take the lease for `key`.
    ///
    /// `Ok(None)` means someone else holds it, which is the normal
    /// "already being handled" outcome and not an error.
    pub async fn try_acquire(&self, key: &str) -> StoreResult<Option<RevalidationLease>> {
        let lock_key = self.lock_key(key);
        let marker = self.holder_id.to_string();
        let acquired_at = self.clock.now();

        let acquired = tokio::time::timeout(
            self.store_timeout,
            self.store
                .set(&lock_key, marker.as_bytes(), self.window, SetMode::IfAbsent),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            operation: "acquire",
            after: self.store_timeout,
        })??;

        if !acquired {
            tracing::trace!(lock_key = %lock_key, "Revalidation lock already held");
            return Ok(None);
        }

        tracing::debug!(lock_key = %lock_key, holder = %self.holder_id, "Revalidation lock acquired");
        Ok(Some(RevalidationLease {
            lock_key,
            acquired_at,
            expires_at: add_duration(acquired_at, self.window),
        }))
    }

    /// Give the lease back.
    ///
    /// A lease past its expiry is no longer ours: the key may already belong
    /// to the next holder, so it is left alone.
    pub async fn release(&self, lease: RevalidationLease) -> StoreResult<()> {
        if lease.expires_at <= self.clock.now() {
            tracing::warn!(
                lock_key = %lease.lock_key,
                expired_at = %lease.expires_at,
                "Revalidation lease expired before release, leaving lock key alone"
            );
            return Ok(());
        }

        tokio::time::timeout(self.store_timeout, self.store.delete(&lease.lock_key))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "release",
                after: self.store_timeout,
            })??;
        tracing::debug!(lock_key = %lease.lock_key, "Revalidation lock released");
        Ok(())
    }
}
