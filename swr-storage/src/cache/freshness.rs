//! Freshness metadata for cache reads.
//!
//! A stale-while-revalidate read never blocks on staleness, but callers that
//! care can still see how old the value is and whether a refresh was kicked
//! off on their behalf.

use std::time::Duration;

use swr_core::Timestamp;

/// Result of a cache hit, carrying staleness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    /// The cached value.
    value: T,
    /// When the value stops being fresh.
    revalidate_at: Timestamp,
    /// The cache clock's reading when the entry was read.
    read_at: Timestamp,
    /// Whether this read spawned a background revalidation.
    revalidation_scheduled: bool,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(
        value: T,
        revalidate_at: Timestamp,
        read_at: Timestamp,
        revalidation_scheduled: bool,
    ) -> Self {
        Self {
            value,
            revalidate_at,
            read_at,
            revalidation_scheduled,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// When this value stops being fresh.
    pub fn revalidate_at(&self) -> Timestamp {
        self.revalidate_at
    }

    /// When the entry was read, by the cache's clock.
    pub fn read_at(&self) -> Timestamp {
        self.read_at
    }

    /// True if the value was past its revalidation instant when read.
    pub fn is_stale(&self) -> bool {
        self.revalidate_at < self.read_at
    }

    /// True if this read started a background refresh.
    pub fn revalidation_scheduled(&self) -> bool {
        self.revalidation_scheduled
    }

    /// How far past `revalidate_at` the value was when read, zero while
    /// fresh.
    pub fn staleness(&self) -> Duration {
        (self.read_at - self.revalidate_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            revalidate_at: self.revalidate_at,
            read_at: self.read_at,
            revalidation_scheduled: self.revalidation_scheduled,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_fresh_read() {
        let now = Utc::now();
        let at = now + chrono::Duration::seconds(30);
        let read = CacheRead::new("v".to_string(), at, now, false);
        assert!(!read.is_stale());
        assert!(!read.revalidation_scheduled());
        assert_eq!(read.staleness(), Duration::ZERO);
        assert_eq!(read.revalidate_at(), at);
        assert_eq!(read.into_value(), "v");
    }

    #[test]
    fn test_staleness_measured_at_read_time() {
        let now = Utc::now();
        let at = now - chrono::Duration::seconds(5);
        let read = CacheRead::new(1u8, at, now, true);
        assert!(read.is_stale());
        assert!(read.revalidation_scheduled());
        assert_eq!(read.read_at(), now);
        assert_eq!(read.staleness(), Duration::from_secs(5));
    }

    #[test]
    fn test_exactly_at_revalidate_at_is_fresh() {
        let now = Utc::now();
        let read = CacheRead::new((), now, now, false);
        assert!(!read.is_stale());
        assert_eq!(read.staleness(), Duration::ZERO);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let now = Utc::now();
        let at = now - chrono::Duration::seconds(1);
        let read = CacheRead::new(42i32, at, now, false).map(|v| v.to_string());
        assert!(read.is_stale());
        assert_eq!(read.revalidate_at(), at);
        assert_eq!(read.as_ref(), "42");
    }
}
