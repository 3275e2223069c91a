//! Cache usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of cache usage for one manager instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that returned nothing (absent, undecodable or store failure).
    pub misses: u64,
    /// Hits whose value was past its revalidation instant.
    pub stale_hits: u64,
    /// Store calls that failed or timed out.
    pub store_errors: u64,
    /// Stored entries that could not be decoded.
    pub decode_failures: u64,
    /// Revalidations that acquired the lock and ran.
    pub revalidations_started: u64,
    /// Revalidations abandoned because another holder had the lock.
    pub revalidations_skipped: u64,
    /// Revalidations that wrote a fresh value.
    pub revalidations_refreshed: u64,
    /// Revalidations whose source failed, evicting the entry.
    pub revalidations_evicted: u64,
    /// Revalidations whose source succeeded but whose write failed.
    pub revalidations_write_failed: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Revalidations that ran to completion, whatever the result.
    pub fn revalidations_finished(&self) -> u64 {
        self.revalidations_refreshed + self.revalidations_evicted + self.revalidations_write_failed
    }
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    store_errors: AtomicU64,
    decode_failures: AtomicU64,
    revalidations_started: AtomicU64,
    revalidations_skipped: AtomicU64,
    revalidations_refreshed: AtomicU64,
    revalidations_evicted: AtomicU64,
    revalidations_write_failed: AtomicU64,
}

macro_rules! recorder {
    ($($name:ident => $field:ident),* $(,)?) => {
        impl StatsRecorder {
            $(
                pub(crate) fn $name(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

recorder! {
    record_hit => hits,
    record_miss => misses,
    record_stale_hit => stale_hits,
    record_store_error => store_errors,
    record_decode_failure => decode_failures,
    record_revalidation_started => revalidations_started,
    record_revalidation_skipped => revalidations_skipped,
    record_revalidation_refreshed => revalidations_refreshed,
    record_revalidation_evicted => revalidations_evicted,
    record_revalidation_write_failed => revalidations_write_failed,
}

impl StatsRecorder {
    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            revalidations_started: self.revalidations_started.load(Ordering::Relaxed),
            revalidations_skipped: self.revalidations_skipped.load(Ordering::Relaxed),
            revalidations_refreshed: self.revalidations_refreshed.load(Ordering::Relaxed),
            revalidations_evicted: self.revalidations_evicted.load(Ordering::Relaxed),
            revalidations_write_failed: self.revalidations_write_failed.load(Ordering::Relaxed),
        }
    }
}
